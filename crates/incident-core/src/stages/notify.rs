//! Notification payload
//!
//! Runs only after risk predictions are merged and sees them already
//! filtered to HIGH. Delivery is left to the consumer of the run outcome.

use super::Stage;
use crate::config::NotifyConfig;
use crate::error::StageError;
use crate::reasoner::Reasoner;
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::types::{Issue, Notification, RiskPrediction, StageId};
use std::cmp::Reverse;
use std::fmt::Write;

pub const NO_ISSUES_SUMMARY: &str = "No actionable issues detected.";

const TOP_ISSUES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    config: NotifyConfig,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, issues: &[Issue], high_risks: Vec<RiskPrediction>) -> Notification {
        let (headline, summary) = match issues.iter().map(|i| i.severity).max() {
            None => ("All clear".to_string(), NO_ISSUES_SUMMARY.to_string()),
            Some(highest) => {
                let plural = if issues.len() == 1 { "" } else { "s" };
                (
                    format!("{highest} incident: {} issue{plural} detected", issues.len()),
                    summarize(issues, &high_risks),
                )
            }
        };

        Notification {
            channel: self.config.channel.clone(),
            headline,
            summary,
            high_risks,
            delivered: false,
        }
    }
}

fn summarize(issues: &[Issue], high_risks: &[RiskPrediction]) -> String {
    let mut ordered: Vec<&Issue> = issues.iter().collect();
    ordered.sort_by_key(|i| Reverse(i.severity));

    let mut out = String::new();
    for issue in ordered.iter().take(TOP_ISSUES) {
        let _ = writeln!(out, "- [{}] {}", issue.severity, issue.description);
    }
    if ordered.len() > TOP_ISSUES {
        let _ = writeln!(out, "- ...and {} more", ordered.len() - TOP_ISSUES);
    }
    if !high_risks.is_empty() {
        out.push_str("\nRisk Forecast:\n");
        for risk in high_risks {
            let _ = writeln!(
                out,
                "- {} ({}): {} Action: {}",
                risk.service, risk.time_horizon, risk.prediction, risk.preventive_action
            );
        }
    }
    out.trim_end().to_string()
}

#[async_trait::async_trait]
impl Stage for Notifier {
    fn id(&self) -> StageId {
        StageId::Notify
    }

    async fn run(&self, input: StageInput, _reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let issues: Vec<Issue> = input.issues.iter().cloned().collect();
        let notification = self.compose(&issues, input.high_risks.iter().cloned().collect());
        tracing::info!(
            channel = %notification.channel,
            high_risks = notification.high_risks.len(),
            "notification prepared"
        );
        Ok(StageUpdate::new(StageOutput::Notification(notification)))
    }
}
