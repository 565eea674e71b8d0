//! Deterministic, offline reasoner
//!
//! Answers every [`ReasoningTask`] from the request context alone using fixed
//! rules. Used by the CLI and as the pipeline default.

use super::{Reasoner, ReasonerError, ReasonerRequest, ReasoningTask};
use serde_json::{json, Value};

/// Rule-based [`Reasoner`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleReasoner;

impl RuleReasoner {
    /// Create new rule reasoner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn causal_chain(context: &Value) -> Value {
        let events = context["events"].as_array().cloned().unwrap_or_default();
        let adjacent = context["adjacent"].as_bool().unwrap_or(false);

        let Some(first) = events.first() else {
            return json!({
                "root_cause": "no events supplied",
                "confidence": "LOW",
                "summary": "Nothing to correlate.",
            });
        };
        let root_service = first["service"].as_str().unwrap_or("unknown");
        let root_event = first["event"].as_str().unwrap_or("");

        let mut downstream: Vec<&str> = Vec::new();
        for event in &events[1..] {
            if let Some(service) = event["service"].as_str() {
                if service != root_service && !downstream.contains(&service) {
                    downstream.push(service);
                }
            }
        }

        // A later event naming the root service is explicit evidence.
        let root_lower = root_service.to_lowercase();
        let referenced = events[1..].iter().any(|event| {
            event["service"].as_str() != Some(root_service)
                && event["event"]
                    .as_str()
                    .is_some_and(|text| text.to_lowercase().contains(&root_lower))
        });

        let confidence = match (adjacent, referenced) {
            (true, true) => "HIGH",
            (true, false) => "MEDIUM",
            _ => "LOW",
        };
        let summary = if downstream.is_empty() {
            format!("Repeated failures in {root_service} within a short window.")
        } else {
            format!(
                "A failure in {root_service} preceded errors in {}.",
                downstream.join(", ")
            )
        };

        json!({
            "root_cause": format!("{root_service}: {root_event}"),
            "confidence": confidence,
            "summary": summary,
        })
    }

    fn risk_assessment(context: &Value) -> Value {
        let service = context["service"].as_str().unwrap_or("unknown");
        let signals: Vec<&str> = context["signals"]
            .as_array()
            .map(|items| items.iter().filter_map(|s| s["signal"].as_str()).collect())
            .unwrap_or_default();

        let severe = signals.iter().any(|s| {
            matches!(
                *s,
                "pool_exhaustion" | "disk_critical" | "frequency_acceleration" | "brute_force"
            )
        });
        let risk_level = match signals.len() {
            0 => "LOW",
            1 if !severe => "MEDIUM",
            _ => "HIGH",
        };

        let strongest = signals
            .iter()
            .copied()
            .min_by_key(|s| signal_rank(s))
            .unwrap_or("none");
        let (prediction, action, horizon) = match strongest {
            "pool_exhaustion" => (
                format!("{service} will exhaust its connection pool and start queueing or rejecting requests"),
                "Raise the pool size or shed load, and look for leaked connections".to_string(),
                "minutes",
            ),
            "disk_critical" => (
                format!("{service} will run out of disk space and writes will fail"),
                "Free or expand storage and rotate logs before the volume fills".to_string(),
                "hours",
            ),
            "frequency_acceleration" => (
                format!("Errors in {service} are arriving faster and will escalate into an outage"),
                "Throttle incoming traffic and inspect the failing dependency".to_string(),
                "minutes",
            ),
            "brute_force" => (
                format!("Repeated authentication failures against {service} will lead to lockouts or a compromise"),
                "Rate-limit or block the offending sources and review the targeted accounts".to_string(),
                "minutes",
            ),
            "retry_escalation" => (
                format!("Retries in {service} will be exhausted and the operation will fail"),
                "Check the downstream dependency and add backoff or a circuit breaker".to_string(),
                "minutes",
            ),
            trend if trend.starts_with("trend:") => {
                let metric = &trend["trend:".len()..];
                (
                    format!("{metric} in {service} keeps moving toward failure"),
                    format!("Investigate what is driving {metric} and set an alert on it"),
                    "hours",
                )
            }
            _ => (
                format!("{service} shows no clear escalation"),
                "Keep monitoring".to_string(),
                "eventual",
            ),
        };

        json!({
            "risk_level": risk_level,
            "prediction": prediction,
            "preventive_action": action,
            "time_horizon": horizon,
        })
    }

    fn remediation(context: &Value) -> Value {
        let issue = &context["issue"];
        let description = issue["description"].as_str().unwrap_or("");
        let severity = issue["severity"].as_str().unwrap_or("MEDIUM");
        let lower = description.to_lowercase();

        let steps: &[&str] = if lower.contains("disk") || lower.contains("storage") {
            &[
                "Identify the largest directories on the affected volume",
                "Rotate or archive old logs and temporary files",
                "Expand the volume if usage stays above threshold",
            ]
        } else if lower.contains("connection") || lower.contains("pool") {
            &[
                "Check active connections against the pool limit",
                "Look for long-running or leaked connections",
                "Raise the pool size or add backpressure",
            ]
        } else if lower.contains("auth") || lower.contains("login") || lower.contains("credential") {
            &[
                "Review the source addresses of the failed attempts",
                "Rate-limit or block offending sources",
                "Verify the affected accounts and rotate credentials if needed",
            ]
        } else if lower.contains("timeout") || lower.contains("latency") || lower.contains("slow") {
            &[
                "Measure latency of the downstream dependency",
                "Check recent deploys and resource saturation",
                "Tune timeouts and add retries with backoff",
            ]
        } else if lower.contains("memory") || lower.contains("oom") {
            &[
                "Inspect memory usage of the affected process",
                "Capture a heap profile before restarting",
                "Raise limits or fix the leak",
            ]
        } else {
            &[
                "Inspect the log entries around the issue",
                "Identify the failing component and its recent changes",
                "Apply a fix or roll back, then verify the error rate",
            ]
        };

        json!({
            "steps": steps,
            "rationale": format!("Standard response for a {severity} issue: {description}"),
        })
    }
}

/// Lower is stronger
fn signal_rank(signal: &str) -> u8 {
    match signal {
        "pool_exhaustion" => 0,
        "disk_critical" => 1,
        "frequency_acceleration" => 2,
        "brute_force" => 3,
        "retry_escalation" => 4,
        _ => 5,
    }
}

#[async_trait::async_trait]
impl Reasoner for RuleReasoner {
    async fn reason(&self, request: ReasonerRequest) -> Result<Value, ReasonerError> {
        let reply = match request.task {
            ReasoningTask::CausalChain => Self::causal_chain(&request.context),
            ReasoningTask::RiskAssessment => Self::risk_assessment(&request.context),
            ReasoningTask::Remediation => Self::remediation(&request.context),
        };
        Ok(reply)
    }
}
