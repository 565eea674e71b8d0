//! Incident pipeline
//!
//! Binds the seven stages to the kernel scheduler:
//!
//! ```text
//! classify -> remediate -> { cookbook, ticket, root_cause, predictive_risk }
//!                                                          predictive_risk -> notify
//! ```
//!
//! Terminal stages are cookbook, ticket, root_cause and notify. The graph is
//! validated once when the pipeline is built; a malformed graph is a fatal
//! [`PipelineError::Configuration`].

use crate::config::PipelineConfig;
use crate::error::{PipelineError, SoftError, SoftErrorKind};
use crate::reasoner::{Reasoner, RuleReasoner};
use crate::stages::{Stage, StageSet};
use crate::state::{SharedState, StageOutput, StageUpdate};
use crate::types::{Issue, LogEntry, RunId, StageId};
use incident_kernel::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The fixed stage dependency graph
pub fn stage_graph() -> Result<ValidatedGraph<StageId>, GraphError> {
    let mut builder = GraphBuilder::new(StageId::Classify);
    builder
        .depends_on(StageId::Remediate, &[StageId::Classify])
        .fan_out(
            StageId::Remediate,
            &[
                StageId::Cookbook,
                StageId::Ticket,
                StageId::RootCause,
                StageId::PredictiveRisk,
            ],
        )
        .depends_on(StageId::Notify, &[StageId::PredictiveRisk])
        .with_terminals(&[
            StageId::Cookbook,
            StageId::Ticket,
            StageId::RootCause,
            StageId::Notify,
        ]);
    builder.validate()
}

/// Upstream input of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    #[serde(default)]
    pub log_entries: Vec<LogEntry>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl PipelineInput {
    pub fn new(log_entries: Vec<LogEntry>, issues: Vec<Issue>) -> Self {
        Self { log_entries, issues }
    }

    /// Line numbers identify entries, so they must be unique
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::with_capacity(self.log_entries.len());
        for entry in &self.log_entries {
            if !seen.insert(entry.line_number) {
                return Err(PipelineError::InvalidInput(format!(
                    "duplicate line_number {}",
                    entry.line_number
                )));
            }
        }
        Ok(())
    }
}

/// Terminal value of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub state: SharedState,
    /// Soft errors recorded by stages, then stage-level failures
    pub diagnostics: Vec<SoftError>,
    #[serde(serialize_with = "serialize_status")]
    pub status: RunStatus,
    /// Stages in the order their updates were merged
    pub completion_order: Vec<StageId>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Whether the run stopped before every terminal stage completed
    pub fn is_partial(&self) -> bool {
        self.status.is_partial()
    }

    pub fn diagnostics_for(&self, stage: StageId) -> impl Iterator<Item = &SoftError> + '_ {
        self.diagnostics.iter().filter(move |d| d.stage == stage)
    }
}

fn serialize_status<S: Serializer>(status: &RunStatus, serializer: S) -> Result<S::Ok, S::Error> {
    match status {
        RunStatus::Completed => serializer.serialize_str("completed"),
        RunStatus::Cancelled(CancelReason::External) => serializer.serialize_str("cancelled"),
        RunStatus::Cancelled(CancelReason::Timeout) => serializer.serialize_str("timed_out"),
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Runs stages as kernel nodes
struct StageRunner {
    run_id: RunId,
    stages: StageSet,
    reasoner: Arc<dyn Reasoner>,
    config: PipelineConfig,
}

#[async_trait::async_trait]
impl NodeRunner<StageId, SharedState> for StageRunner {
    type Update = StageUpdate;

    async fn run(&self, node: StageId, snapshot: Arc<SharedState>) -> Result<StageUpdate, NodeFailure> {
        let stage = self
            .stages
            .get(node)
            .cloned()
            .ok_or_else(|| NodeFailure::failed(format!("no stage registered for `{node}`")))?;
        let input = snapshot.view_for(node);
        // The stage only ever sees its own slice.
        drop(snapshot);

        let span = tracing::info_span!("stage", run_id = %self.run_id, stage = %node);
        async {
            tracing::debug!("stage started");
            let update = stage
                .run(input, self.reasoner.as_ref())
                .await
                .map_err(|err| NodeFailure::failed(err.to_string()))?;
            tracing::debug!(soft_errors = update.soft_errors.len(), "stage finished");
            Ok::<_, NodeFailure>(update)
        }
        .instrument(span)
        .await
    }

    fn degraded(&self, node: StageId) -> StageUpdate {
        StageUpdate::new(StageOutput::empty_for(node, &self.config))
    }

    fn merge(&self, state: &mut SharedState, node: StageId, update: StageUpdate) -> Result<(), NodeFailure> {
        state
            .apply(node, update)
            .map_err(|err| NodeFailure::merge_rejected(err.to_string()))
    }
}

/// Builder for [`IncidentPipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    reasoner: Option<Arc<dyn Reasoner>>,
    overrides: Vec<Arc<dyn Stage>>,
    cancel: Option<CancellationToken>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Reasoner used by every stage; [`RuleReasoner`] when unset
    #[must_use]
    pub fn reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    /// Replace the built-in stage with the same [`Stage::id`]
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.overrides.push(stage);
        self
    }

    /// Cancelling `token` stops every run of the built pipeline
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<IncidentPipeline, PipelineError> {
        self.config.validate()?;
        let graph = stage_graph()?;

        let mut stages = StageSet::standard(&self.config);
        for stage in self.overrides {
            tracing::debug!(stage = %stage.id(), "stage overridden");
            stages.replace(stage);
        }

        Ok(IncidentPipeline {
            graph,
            stages,
            reasoner: self.reasoner.unwrap_or_else(|| Arc::new(RuleReasoner)),
            cancel: self.cancel.unwrap_or_default(),
            config: self.config,
        })
    }
}

/// Validated, reusable pipeline
pub struct IncidentPipeline {
    config: PipelineConfig,
    graph: ValidatedGraph<StageId>,
    stages: StageSet,
    reasoner: Arc<dyn Reasoner>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for IncidentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncidentPipeline")
            .field("stages", &self.stages)
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish_non_exhaustive()
    }
}

impl IncidentPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn graph(&self) -> &ValidatedGraph<StageId> {
        &self.graph
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token observed by every run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Analyze one log
    ///
    /// Only invalid input is an `Err`. Stage failures and soft errors end up
    /// in [`RunOutcome::diagnostics`]; cancellation in [`RunOutcome::status`].
    pub async fn run(&self, input: PipelineInput) -> Result<RunOutcome, PipelineError> {
        input.validate()?;

        let run_id = RunId::new();
        let span = tracing::info_span!("run", %run_id);
        let runner = Arc::new(StageRunner {
            run_id,
            stages: self.stages.clone(),
            reasoner: Arc::clone(&self.reasoner),
            config: self.config.clone(),
        });
        let scheduler = GraphScheduler::new(self.config.scheduler.to_scheduler_config())
            .with_cancellation(self.cancel.child_token());

        let state = SharedState::new(input.log_entries, input.issues);
        tracing::info!(
            parent: &span,
            entries = state.log_entries().len(),
            issues = state.issues().len(),
            "analysis started"
        );
        let report = scheduler.run(&self.graph, state, runner).instrument(span.clone()).await;

        let mut diagnostics = report.state.soft_errors();
        diagnostics.extend(report.failures.iter().map(|failed| {
            let kind = match failed.failure.kind {
                FailureKind::MergeRejected => SoftErrorKind::MergeRejected,
                FailureKind::Failed | FailureKind::Panicked => SoftErrorKind::StageFailed,
            };
            SoftError::new(failed.node, kind, failed.failure.to_string())
        }));

        tracing::info!(
            parent: &span,
            status = ?report.status,
            diagnostics = diagnostics.len(),
            chains = report.state.causal_chains().len(),
            risks = report.state.risk_predictions().len(),
            "analysis finished"
        );

        Ok(RunOutcome {
            run_id,
            state: report.state,
            diagnostics,
            status: report.status,
            completion_order: report.completed,
            elapsed: report.elapsed,
        })
    }
}
