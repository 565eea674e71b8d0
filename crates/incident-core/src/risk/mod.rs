//! Risk Detector
//!
//! Forecasts which services are escalating toward failure. Three
//! deterministic detectors run per service over its WARN/ERROR/CRITICAL
//! entries:
//!
//! - [`frequency`]: inter-event gaps shrinking
//! - [`trend`]: extracted numbers moving monotonically in the bad direction
//! - [`patterns`]: four fixed signatures
//!
//! Fired signals are bundled per service with line-level evidence and each
//! bundle is assessed by the reasoner. A service with no signal is never
//! sent.

pub mod frequency;
pub mod patterns;
pub mod signal;
mod synthesis;
pub mod trend;

pub use signal::{EvidenceBundle, Metric, Signal, SignalKind};

use crate::config::RiskConfig;
use crate::correlation::{is_attributable, service_key};
use crate::error::{SoftError, SoftErrorKind, StageError};
use crate::reasoner::Reasoner;
use crate::stages::Stage;
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::timeline::{self, Timeline};
use crate::types::{LogEntry, RiskPrediction, StageId};
use futures::future::join_all;
use indexmap::IndexMap;

/// Bundles plus the entries that could not be placed in time
#[derive(Debug, Clone, Default)]
pub struct SignalScan {
    /// One bundle per service with at least one signal, in log order
    pub bundles: Vec<EvidenceBundle>,
    /// Lines of actionable entries whose timestamp did not parse
    pub unparseable: Vec<u32>,
}

/// Escalation risk stage
#[derive(Debug, Clone, Default)]
pub struct RiskDetector {
    config: RiskConfig,
}

impl RiskDetector {
    /// Detector with the given thresholds
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Run every detector and bundle fired signals per service
    pub fn scan(&self, entries: &[LogEntry]) -> SignalScan {
        let mut by_line: Vec<&LogEntry> = entries.iter().filter(|e| is_attributable(&e.service)).collect();
        by_line.sort_by_key(|e| e.line_number);

        // Keyed by first appearance at any level so output follows the log.
        let mut services: IndexMap<String, (&str, Vec<&LogEntry>)> = IndexMap::new();
        for entry in by_line {
            let (_, actionable) = services
                .entry(service_key(&entry.service))
                .or_insert_with(|| (entry.service.trim(), Vec::new()));
            if entry.level.is_actionable() {
                actionable.push(entry);
            }
        }

        let mut scan = SignalScan::default();
        for (service, ordered) in services.into_values() {
            if ordered.is_empty() {
                continue;
            }
            let timeline = Timeline::build(ordered.iter().copied());
            scan.unparseable.extend(&timeline.unparseable);

            let mut signals = Vec::new();
            signals.extend(frequency::frequency_acceleration(&timeline.timed, &self.config));
            signals.extend(trend::trends(&ordered, &self.config));
            signals.extend(patterns::known_patterns(&timeline.timed, &ordered, &self.config));
            if signals.is_empty() {
                continue;
            }

            tracing::debug!(
                service,
                signals = ?signals.iter().map(|s| s.kind.to_string()).collect::<Vec<_>>(),
                "escalation signals fired"
            );
            scan.bundles.push(EvidenceBundle::new(service, signals, &ordered));
        }
        scan.unparseable.sort_unstable();
        scan
    }

    /// Detect, then assess every bundle with the reasoner
    pub async fn assess(
        &self,
        entries: &[LogEntry],
        reasoner: &dyn Reasoner,
    ) -> (Vec<RiskPrediction>, Vec<SoftError>) {
        let scan = self.scan(entries);
        let mut soft_errors: Vec<SoftError> = timeline::unparseable_error(StageId::PredictiveRisk, &scan.unparseable)
            .into_iter()
            .collect();

        tracing::info!(services = scan.bundles.len(), "risk bundles assembled");
        if scan.bundles.is_empty() {
            return (Vec::new(), soft_errors);
        }

        let replies = join_all(
            scan.bundles
                .iter()
                .map(|bundle| reasoner.reason(synthesis::request_for(bundle))),
        )
        .await;

        let mut predictions = Vec::new();
        for (bundle, reply) in scan.bundles.iter().zip(replies) {
            let outcome = reply
                .map_err(|err| (SoftErrorKind::ReasonerFailed, err.to_string()))
                .and_then(|value| {
                    synthesis::prediction_from_reply(bundle, &value)
                        .map_err(|shape| (SoftErrorKind::MalformedReasonerOutput, shape.to_string()))
                });
            match outcome {
                Ok(prediction) => predictions.push(prediction),
                Err((kind, message)) => {
                    tracing::warn!(service = %bundle.service, %kind, %message, "risk prediction omitted");
                    soft_errors.push(SoftError::new(
                        StageId::PredictiveRisk,
                        kind,
                        format!("service {}: {message}", bundle.service),
                    ));
                }
            }
        }

        (predictions, soft_errors)
    }
}

#[async_trait::async_trait]
impl Stage for RiskDetector {
    fn id(&self) -> StageId {
        StageId::PredictiveRisk
    }

    async fn run(&self, input: StageInput, reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let entries: Vec<LogEntry> = input.log_entries.iter().cloned().collect();
        let (predictions, soft_errors) = self.assess(&entries, reasoner).await;
        Ok(StageUpdate::new(StageOutput::RiskPredictions(predictions)).with_soft_errors(soft_errors))
    }
}
