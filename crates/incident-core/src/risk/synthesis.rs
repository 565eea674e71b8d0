//! Risk synthesis against the reasoner

use super::signal::EvidenceBundle;
use crate::reasoner::{ReasonerRequest, ReasoningTask, Reply, ReplyShapeError};
use crate::types::{RiskLevel, RiskPrediction};
use serde_json::{json, Value};

pub(super) fn request_for(bundle: &EvidenceBundle) -> ReasonerRequest {
    ReasonerRequest::new(
        ReasoningTask::RiskAssessment,
        json!({
            "service": bundle.service,
            "signals": bundle.signals,
            "evidence": bundle.evidence,
        }),
    )
}

/// Evidence always comes from the bundle, never from the reply
pub(super) fn prediction_from_reply(bundle: &EvidenceBundle, reply: &Value) -> Result<RiskPrediction, ReplyShapeError> {
    let reply = Reply::parse(reply)?;
    Ok(RiskPrediction {
        service: bundle.service.clone(),
        risk_level: RiskLevel::from_label(reply.label("risk_level")),
        prediction: reply.text("prediction")?,
        evidence: bundle.evidence.clone(),
        preventive_action: reply.text("preventive_action")?,
        time_horizon: reply
            .label("time_horizon")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or("unknown")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::signal::{Signal, SignalKind};
    use crate::types::{LogEntry, LogLevel};

    fn bundle() -> EvidenceBundle {
        let entries = [LogEntry::new(4, "2024-01-01 00:00:00", LogLevel::Error, "db", "disk usage 97%")];
        let refs: Vec<&LogEntry> = entries.iter().collect();
        EvidenceBundle::new("db", vec![Signal::new(SignalKind::DiskCritical, "97%", [4])], &refs)
    }

    #[test]
    fn request_lists_signals_by_name() {
        let request = request_for(&bundle());
        assert_eq!(request.task, ReasoningTask::RiskAssessment);
        assert_eq!(request.context["signals"][0]["signal"], "disk_critical");
        assert_eq!(request.context["signals"][0]["lines"][0], 4);
        assert_eq!(request.context["evidence"][0], "line 4 [disk_critical]: disk usage 97%");
    }

    #[test]
    fn lenient_level_and_horizon() {
        let reply = json!({"risk_level": "severe", "prediction": "p", "preventive_action": "a"});
        let prediction = prediction_from_reply(&bundle(), &reply).unwrap();
        assert_eq!(prediction.risk_level, RiskLevel::Medium);
        assert_eq!(prediction.time_horizon, "unknown");
        assert_eq!(prediction.evidence, bundle().evidence);
    }

    #[test]
    fn prediction_and_action_are_required() {
        let reply = json!({"risk_level": "HIGH", "prediction": "p"});
        let err = prediction_from_reply(&bundle(), &reply).unwrap_err();
        assert_eq!(err.to_string(), "missing `preventive_action`");
    }
}
