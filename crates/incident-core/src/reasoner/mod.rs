//! Reasoner capability
//!
//! Stages refine heuristic candidates into natural-language findings through
//! the [`Reasoner`] trait. Every reply is untrusted structured JSON: callers
//! validate its shape and degrade to a soft error when it does not fit.

mod rule;

pub use crate::error::ReasonerError;
pub use rule::RuleReasoner;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of reasoning a stage asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTask {
    /// Identify root cause, confidence and summary of one correlation candidate
    CausalChain,
    /// Assess one service's escalation evidence bundle
    RiskAssessment,
    /// Suggest remediation steps for one issue
    Remediation,
}

impl fmt::Display for ReasoningTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReasoningTask::CausalChain => "causal_chain",
            ReasoningTask::RiskAssessment => "risk_assessment",
            ReasoningTask::Remediation => "remediation",
        };
        f.write_str(name)
    }
}

/// Structured prompt context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonerRequest {
    pub task: ReasoningTask,
    pub context: Value,
}

impl ReasonerRequest {
    /// Create new request
    pub fn new(task: ReasoningTask, context: Value) -> Self {
        Self { task, context }
    }
}

/// Injectable reasoning capability
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    /// Answer one request with structured JSON
    async fn reason(&self, request: ReasonerRequest) -> Result<Value, ReasonerError>;
}

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\w*\n?").expect("valid regex"));
static CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?```$").expect("valid regex"));

/// Parse a text reply into JSON, tolerating a surrounding markdown code fence
pub fn parse_json_reply(text: &str) -> Result<Value, ReasonerError> {
    let trimmed = text.trim();
    let body = if trimmed.starts_with("```") {
        let opened = OPENING_FENCE.replace(trimmed, "");
        CLOSING_FENCE.replace(&opened, "").into_owned()
    } else {
        trimmed.to_string()
    };
    serde_json::from_str(&body)
        .map_err(|_| ReasonerError::InvalidReply(excerpt(&body, REPLY_EXCERPT_CHARS)))
}

/// Maximum characters of raw reply text quoted in diagnostics
pub const REPLY_EXCERPT_CHARS: usize = 200;

/// First `max_chars` characters of `text`
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Shape violation in a reasoner reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplyShapeError(pub(crate) String);

impl fmt::Display for ReplyShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// View of a reply as a single JSON object
///
/// A one-element array wrapping an object is accepted as well.
pub(crate) struct Reply<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Reply<'a> {
    pub(crate) fn parse(value: &'a Value) -> Result<Self, ReplyShapeError> {
        let object = match value {
            Value::Object(fields) => Some(fields),
            Value::Array(items) if items.len() == 1 => items[0].as_object(),
            _ => None,
        };
        object.map(|fields| Self { fields }).ok_or_else(|| {
            ReplyShapeError(format!(
                "expected a JSON object, got {}",
                excerpt(&value.to_string(), REPLY_EXCERPT_CHARS)
            ))
        })
    }

    /// Required, non-blank string field
    pub(crate) fn text(&self, key: &str) -> Result<String, ReplyShapeError> {
        match self.fields.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::String(_)) => Err(ReplyShapeError(format!("`{key}` is blank"))),
            Some(other) => Err(ReplyShapeError(format!(
                "`{key}` must be a string, got {}",
                excerpt(&other.to_string(), REPLY_EXCERPT_CHARS)
            ))),
            None => Err(ReplyShapeError(format!("missing `{key}`"))),
        }
    }

    /// Optional string field; non-strings count as absent
    pub(crate) fn label(&self, key: &str) -> Option<&'a str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Optional list of strings; non-string items are skipped
    pub(crate) fn list(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_code_fences() {
        let reply = parse_json_reply("```json\n{\"root_cause\": \"db\"}\n```").unwrap();
        assert_eq!(reply, json!({"root_cause": "db"}));

        let reply = parse_json_reply("  [1, 2]  ").unwrap();
        assert_eq!(reply, json!([1, 2]));
    }

    #[test]
    fn invalid_reply_is_truncated() {
        let text = format!("not json {}", "x".repeat(500));
        match parse_json_reply(&text) {
            Err(ReasonerError::InvalidReply(body)) => assert_eq!(body.chars().count(), 200),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("ab", 10), "ab");
    }

    #[test]
    fn reply_accessors() {
        let value = json!([{"summary": " ok ", "confidence": 3, "steps": ["a", 1, " ", "b"]}]);
        let reply = Reply::parse(&value).unwrap();

        assert_eq!(reply.text("summary").unwrap(), "ok");
        assert_eq!(reply.text("root_cause").unwrap_err().to_string(), "missing `root_cause`");
        assert!(reply.text("confidence").is_err());
        assert_eq!(reply.label("confidence"), None);
        assert_eq!(reply.list("steps"), vec!["a", "b"]);

        assert!(Reply::parse(&json!("text")).is_err());
        assert!(Reply::parse(&json!([{}, {}])).is_err());
    }

    #[tokio::test]
    async fn mock_reasoner_is_object_safe() {
        let mut mock = MockReasoner::new();
        mock.expect_reason()
            .withf(|req| req.task == ReasoningTask::Remediation)
            .returning(|_| Ok(json!({"steps": []})));

        let reasoner: &dyn Reasoner = &mock;
        let reply = reasoner
            .reason(ReasonerRequest::new(ReasoningTask::Remediation, json!({})))
            .await
            .unwrap();
        assert_eq!(reply, json!({"steps": []}));
    }
}
