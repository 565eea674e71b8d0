//! Causal Correlator
//!
//! Groups actionable log entries into cause-to-effect chains:
//! 1. Temporal clustering of WARN/ERROR/CRITICAL entries
//! 2. Service adjacency from message text
//! 3. Candidates: clusters whose services are connected under adjacency
//! 4. One reasoner call per candidate for root cause, confidence, summary
//! 5. Reply validation; a bad reply skips that candidate with a soft error
//!
//! Steps 1-3 are deterministic and exposed through
//! [`CausalCorrelator::candidates`].

mod adjacency;
mod cluster;
mod synthesis;

pub use adjacency::{is_attributable, service_key, ServiceAdjacency};
pub use cluster::temporal_clusters;

use crate::config::{AdjacencyPolicy, CorrelationConfig};
use crate::error::{SoftError, SoftErrorKind, StageError};
use crate::reasoner::Reasoner;
use crate::stages::Stage;
use crate::state::{StageInput, StageOutput, StageUpdate};
use crate::timeline::{self, Timeline};
use crate::types::{CausalChain, LogEntry, StageId};
use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Temporally clustered group of entries eligible for chain synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationCandidate {
    /// Entries in chronological order
    pub events: Vec<LogEntry>,
    /// Distinct services in order of first appearance
    pub services: Vec<String>,
    /// Whether the services passed the adjacency filter
    pub adjacent: bool,
}

impl CorrelationCandidate {
    /// Line numbers of the candidate's events
    pub fn lines(&self) -> Vec<u32> {
        self.events.iter().map(|e| e.line_number).collect()
    }
}

/// Result of the deterministic correlation steps
#[derive(Debug, Clone, Default)]
pub struct CandidateScan {
    /// Clusters that survived the size, service and adjacency filters
    pub candidates: Vec<CorrelationCandidate>,
    /// Known services in first-seen order
    pub known_services: Vec<String>,
    /// Actionable entries excluded for an unparseable timestamp
    pub unparseable: Vec<u32>,
    /// Clusters dropped by the adjacency filter
    pub discarded: usize,
}

/// Causal-chain correlation stage
#[derive(Debug, Clone, Default)]
pub struct CausalCorrelator {
    config: CorrelationConfig,
}

impl CausalCorrelator {
    /// Create new correlator
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config }
    }

    /// Deterministic candidate selection
    pub fn candidates(&self, entries: &[LogEntry]) -> CandidateScan {
        let adjacency = ServiceAdjacency::from_entries(entries);
        // Unattributable entries still bridge clusters; they are never events.
        let timeline = Timeline::build(entries.iter().filter(|e| e.level.is_actionable()));

        let mut scan = CandidateScan {
            known_services: adjacency.known_services().into_iter().map(String::from).collect(),
            unparseable: timeline.unparseable.clone(),
            ..CandidateScan::default()
        };

        for cluster in temporal_clusters(&timeline.timed, self.config.window_secs) {
            let events: Vec<&LogEntry> = cluster
                .iter()
                .map(|t| t.entry)
                .filter(|e| is_attributable(&e.service))
                .collect();
            if events.len() < self.config.min_cluster_size {
                continue;
            }

            let mut services: IndexMap<String, String> = IndexMap::new();
            for entry in &events {
                services
                    .entry(service_key(&entry.service))
                    .or_insert_with(|| entry.service.trim().to_string());
            }
            if services.len() < self.config.min_services {
                continue;
            }

            let keys: BTreeSet<String> = services.keys().cloned().collect();
            let adjacent = adjacency.is_connected(&keys);
            if !adjacent && self.config.adjacency_policy == AdjacencyPolicy::Strict {
                tracing::debug!(
                    entries = events.len(),
                    services = ?keys,
                    "cluster discarded: services do not reference each other"
                );
                scan.discarded += 1;
                continue;
            }

            scan.candidates.push(CorrelationCandidate {
                events: events.into_iter().cloned().collect(),
                services: services.into_values().collect(),
                adjacent,
            });
        }

        scan
    }

    /// Full correlation: candidate selection plus chain synthesis
    ///
    /// Never fails; every per-candidate problem becomes a soft error.
    pub async fn correlate(
        &self,
        entries: &[LogEntry],
        reasoner: &dyn Reasoner,
    ) -> (Vec<CausalChain>, Vec<SoftError>) {
        let scan = self.candidates(entries);
        let mut soft_errors = Vec::new();
        if let Some(err) = timeline::unparseable_error(StageId::RootCause, &scan.unparseable) {
            tracing::warn!(lines = ?scan.unparseable, "entries with unparseable timestamps excluded");
            soft_errors.push(err);
        }

        tracing::info!(
            candidates = scan.candidates.len(),
            discarded = scan.discarded,
            "correlation candidates selected"
        );
        if scan.candidates.is_empty() {
            return (Vec::new(), soft_errors);
        }

        let known: Vec<&str> = scan.known_services.iter().map(String::as_str).collect();
        let replies = join_all(
            scan.candidates
                .iter()
                .map(|candidate| reasoner.reason(synthesis::request_for(candidate, &known))),
        )
        .await;

        let mut chains = Vec::new();
        for (candidate, reply) in scan.candidates.iter().zip(replies) {
            let lines = candidate.lines();
            match reply {
                Ok(value) => match synthesis::chain_from_reply(candidate, &value) {
                    Ok(chain) => {
                        tracing::debug!(lines = ?lines, confidence = %chain.confidence(), "causal chain synthesized");
                        chains.push(chain);
                    }
                    Err(shape) => {
                        tracing::warn!(lines = ?lines, error = %shape, "malformed chain reply; candidate skipped");
                        soft_errors.push(SoftError::new(
                            StageId::RootCause,
                            SoftErrorKind::MalformedReasonerOutput,
                            format!("candidate lines {lines:?}: {shape}"),
                        ));
                    }
                },
                Err(err) => {
                    tracing::warn!(lines = ?lines, error = %err, "reasoner failed; candidate skipped");
                    soft_errors.push(SoftError::new(
                        StageId::RootCause,
                        SoftErrorKind::ReasonerFailed,
                        format!("candidate lines {lines:?}: {err}"),
                    ));
                }
            }
        }

        (chains, soft_errors)
    }
}

#[async_trait::async_trait]
impl Stage for CausalCorrelator {
    fn id(&self) -> StageId {
        StageId::RootCause
    }

    async fn run(&self, input: StageInput, reasoner: &dyn Reasoner) -> Result<StageUpdate, StageError> {
        let entries: Vec<LogEntry> = input.log_entries.iter().cloned().collect();
        let (chains, soft_errors) = self.correlate(&entries, reasoner).await;
        Ok(StageUpdate::new(StageOutput::CausalChains(chains)).with_soft_errors(soft_errors))
    }
}
