//! Chain synthesis
//!
//! Builds the reasoner request for one correlation candidate and validates
//! the reply against the chain shape. Events, affected services and blast
//! radius always come from the candidate; the reply only supplies the root
//! cause, confidence and summary.

use super::CorrelationCandidate;
use crate::reasoner::{Reply, ReplyShapeError, ReasonerRequest, ReasoningTask};
use crate::types::{CausalChain, ChainEvent, Confidence};
use serde_json::{json, Value};

pub(super) fn request_for(candidate: &CorrelationCandidate, known_services: &[&str]) -> ReasonerRequest {
    let events: Vec<Value> = candidate
        .events
        .iter()
        .map(|entry| {
            json!({
                "service": entry.service,
                "event": entry.message,
                "timestamp": entry.timestamp,
                "line_number": entry.line_number,
                "level": entry.level,
            })
        })
        .collect();

    ReasonerRequest::new(
        ReasoningTask::CausalChain,
        json!({
            "events": events,
            "services": candidate.services,
            "known_services": known_services,
            "adjacent": candidate.adjacent,
        }),
    )
}

pub(super) fn chain_from_reply(
    candidate: &CorrelationCandidate,
    reply: &Value,
) -> Result<CausalChain, ReplyShapeError> {
    let reply = Reply::parse(reply)?;
    let root_cause = reply.text("root_cause")?;
    let summary = reply.text("summary")?;
    let confidence = if candidate.adjacent {
        Confidence::from_label(reply.label("confidence"))
    } else {
        Confidence::Low
    };

    let events = candidate.events.iter().map(ChainEvent::from).collect();
    CausalChain::new(events, root_cause, confidence, summary)
        .ok_or_else(|| ReplyShapeError("candidate has no events".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogEntry, LogLevel};

    fn candidate(adjacent: bool) -> CorrelationCandidate {
        CorrelationCandidate {
            events: vec![
                LogEntry::new(1, "2024-01-01 10:00:00", LogLevel::Error, "db", "disk full"),
                LogEntry::new(2, "2024-01-01 10:00:03", LogLevel::Critical, "api", "db write failed"),
            ],
            services: vec!["db".to_string(), "api".to_string()],
            adjacent,
        }
    }

    #[test]
    fn request_carries_only_candidate_events() {
        let request = request_for(&candidate(true), &["db", "api", "cache"]);
        assert_eq!(request.task, ReasoningTask::CausalChain);
        assert_eq!(request.context["events"].as_array().unwrap().len(), 2);
        assert_eq!(request.context["events"][1]["level"], "CRITICAL");
        assert_eq!(request.context["known_services"][2], "cache");
        assert_eq!(request.context["adjacent"], true);
    }

    #[test]
    fn reply_supplies_narrative_only() {
        let reply = json!({
            "root_cause": "db disk full",
            "summary": "db outage broke api writes",
            "confidence": "high",
            "blast_radius": 99,
        });
        let chain = chain_from_reply(&candidate(true), &reply).unwrap();

        assert_eq!(chain.confidence(), Confidence::High);
        assert_eq!(chain.blast_radius(), 2);
        assert_eq!(chain.events()[0].line_number, 1);
    }

    #[test]
    fn non_adjacent_candidates_are_low_confidence() {
        let reply = json!({"root_cause": "x", "summary": "y", "confidence": "HIGH"});
        let chain = chain_from_reply(&candidate(false), &reply).unwrap();
        assert_eq!(chain.confidence(), Confidence::Low);
    }

    #[test]
    fn missing_summary_is_a_shape_error() {
        let reply = json!({"root_cause": "x"});
        let err = chain_from_reply(&candidate(true), &reply).unwrap_err();
        assert_eq!(err.to_string(), "missing `summary`");
    }
}
