//! Shared State
//!
//! One strongly-typed record per run. Every analytical field is backed by a
//! reducer from `incident-composition` and owned by exactly one stage; the
//! only way to change state is [`SharedState::apply`], which the scheduler
//! calls from its serialized merge step.
//!
//! Stages never see `SharedState` itself. They receive a [`StageInput`]: the
//! slice of fields they read, cloned out of the snapshot (all collections are
//! persistent, so the clone is cheap).

use crate::config::PipelineConfig;
use crate::error::{MergeError, SoftError};
use crate::types::{
    CausalChain, Classification, Issue, LogEntry, Notification, Remediation, RiskLevel,
    RiskPrediction, StageId, TicketDraft,
};
use im::Vector;
use incident_composition::{
    CompletionSet, CompositionError, LastWrite, OwnedSlot, OwnershipRegistry, ProvenanceLog,
    Reducer,
};
use once_cell::sync::Lazy;
use serde::Serialize;

/// Field ownership, one writer per field
const FIELD_OWNERS: [(&str, StageId); 7] = [
    ("classification", StageId::Classify),
    ("remediations", StageId::Remediate),
    ("cookbook", StageId::Cookbook),
    ("tickets", StageId::Ticket),
    ("causal_chains", StageId::RootCause),
    ("risk_predictions", StageId::PredictiveRisk),
    ("notification", StageId::Notify),
];

static OWNERSHIP: Lazy<OwnershipRegistry<StageId>> = Lazy::new(|| {
    let mut registry = OwnershipRegistry::new();
    for (field, owner) in FIELD_OWNERS {
        if let Err(err) = registry.claim(field, owner) {
            tracing::error!(error = %err, "conflicting field ownership");
        }
    }
    registry
});

/// Registry of which stage owns which field
pub fn ownership() -> &'static OwnershipRegistry<StageId> {
    &OWNERSHIP
}

/// Accumulated result of one run
#[derive(Debug, Clone, Serialize)]
pub struct SharedState {
    log_entries: Vector<LogEntry>,
    issues: Vector<Issue>,
    classification: OwnedSlot<StageId, Classification>,
    remediations: ProvenanceLog<StageId, Remediation>,
    cookbook: OwnedSlot<StageId, String>,
    tickets: ProvenanceLog<StageId, TicketDraft>,
    causal_chains: ProvenanceLog<StageId, CausalChain>,
    risk_predictions: ProvenanceLog<StageId, RiskPrediction>,
    notification: OwnedSlot<StageId, Notification>,
    soft_errors: ProvenanceLog<StageId, SoftError>,
    completed: CompletionSet<StageId>,
    last_completed: LastWrite<StageId>,
}

impl SharedState {
    /// Fresh state with empty analytical fields
    pub fn new(log_entries: Vec<LogEntry>, issues: Vec<Issue>) -> Self {
        Self {
            log_entries: log_entries.into_iter().collect(),
            issues: issues.into_iter().collect(),
            classification: OwnedSlot::new("classification", StageId::Classify),
            remediations: ProvenanceLog::new("remediations"),
            cookbook: OwnedSlot::new("cookbook", StageId::Cookbook),
            tickets: ProvenanceLog::new("tickets"),
            causal_chains: ProvenanceLog::new("causal_chains"),
            risk_predictions: ProvenanceLog::new("risk_predictions"),
            notification: OwnedSlot::new("notification", StageId::Notify),
            soft_errors: ProvenanceLog::new("soft_errors"),
            completed: CompletionSet::new(),
            last_completed: LastWrite::new(),
        }
    }

    pub fn log_entries(&self) -> &Vector<LogEntry> {
        &self.log_entries
    }

    pub fn issues(&self) -> &Vector<Issue> {
        &self.issues
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.get()
    }

    pub fn remediations(&self) -> Vec<Remediation> {
        self.remediations.to_vec()
    }

    pub fn cookbook(&self) -> Option<&str> {
        self.cookbook.get().map(String::as_str)
    }

    pub fn tickets(&self) -> Vec<TicketDraft> {
        self.tickets.to_vec()
    }

    pub fn causal_chains(&self) -> Vec<CausalChain> {
        self.causal_chains.to_vec()
    }

    pub fn risk_predictions(&self) -> Vec<RiskPrediction> {
        self.risk_predictions.to_vec()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.get()
    }

    /// Soft errors reported by stages, grouped by stage
    pub fn soft_errors(&self) -> Vec<SoftError> {
        self.soft_errors.to_vec()
    }

    /// Whether `stage`'s update has been merged
    pub fn is_complete(&self, stage: StageId) -> bool {
        self.completed.contains(&stage)
    }

    /// Merged stages in stage order
    pub fn completed_stages(&self) -> Vec<StageId> {
        self.completed.iter().copied().collect()
    }

    /// Most recently merged stage; progress display only
    pub fn last_completed(&self) -> Option<StageId> {
        self.last_completed.latest().copied()
    }

    /// Slice of state `stage` reads
    ///
    /// Fields the stage does not read are left empty.
    pub fn view_for(&self, stage: StageId) -> StageInput {
        let mut input = StageInput::empty(stage);
        match stage {
            StageId::Classify
            | StageId::Remediate
            | StageId::Ticket
            | StageId::RootCause
            | StageId::PredictiveRisk => {
                input.log_entries = self.log_entries.clone();
                input.issues = self.issues.clone();
            }
            StageId::Cookbook => {
                input.issues = self.issues.clone();
                input.remediations = self.remediations.iter().cloned().collect();
            }
            StageId::Notify => {
                input.issues = self.issues.clone();
                input.classification = self.classification.get().cloned();
                input.high_risks = self
                    .risk_predictions
                    .iter()
                    .filter(|r| r.risk_level == RiskLevel::High)
                    .cloned()
                    .collect();
            }
        }
        input
    }

    /// Merge `stage`'s update
    ///
    /// The write is checked against field ownership and exactly-once
    /// completion before anything changes; on `Err` state is untouched.
    pub fn apply(&mut self, stage: StageId, update: StageUpdate) -> Result<(), MergeError> {
        if let Some(field) = update.output.field() {
            ownership().authorize(field, stage)?;
        }
        if self.completed.contains(&stage) {
            return Err(CompositionError::duplicate("completed", stage));
        }

        let mut next = self.clone();
        match update.output {
            StageOutput::Classification(value) => next.classification.reduce(stage, value)?,
            StageOutput::Remediations(items) => next.remediations.reduce(stage, items)?,
            StageOutput::Cookbook(text) => next.cookbook.reduce(stage, text)?,
            StageOutput::Tickets(items) => next.tickets.reduce(stage, items)?,
            StageOutput::CausalChains(items) => next.causal_chains.reduce(stage, items)?,
            StageOutput::RiskPredictions(items) => next.risk_predictions.reduce(stage, items)?,
            StageOutput::Notification(value) => next.notification.reduce(stage, value)?,
            StageOutput::Nothing => {}
        }
        next.soft_errors.reduce(stage, update.soft_errors)?;
        next.completed.reduce(stage, ())?;
        next.last_completed.reduce(stage, ())?;

        *self = next;
        Ok(())
    }
}

/// Read-only slice of state handed to one stage
#[derive(Debug, Clone)]
pub struct StageInput {
    pub stage: StageId,
    pub log_entries: Vector<LogEntry>,
    pub issues: Vector<Issue>,
    pub remediations: Vector<Remediation>,
    pub classification: Option<Classification>,
    /// HIGH risk predictions; empty rather than absent when there are none
    pub high_risks: Vector<RiskPrediction>,
}

impl StageInput {
    /// Input with every field empty
    pub fn empty(stage: StageId) -> Self {
        Self {
            stage,
            log_entries: Vector::new(),
            issues: Vector::new(),
            remediations: Vector::new(),
            classification: None,
            high_risks: Vector::new(),
        }
    }
}

/// Output proposed by a stage for the field it owns
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Classification(Classification),
    Remediations(Vec<Remediation>),
    Cookbook(String),
    Tickets(Vec<TicketDraft>),
    CausalChains(Vec<CausalChain>),
    RiskPredictions(Vec<RiskPrediction>),
    Notification(Notification),
    /// No contribution
    Nothing,
}

impl StageOutput {
    /// Field the output is written to
    pub fn field(&self) -> Option<&'static str> {
        match self {
            StageOutput::Classification(_) => Some("classification"),
            StageOutput::Remediations(_) => Some("remediations"),
            StageOutput::Cookbook(_) => Some("cookbook"),
            StageOutput::Tickets(_) => Some("tickets"),
            StageOutput::CausalChains(_) => Some("causal_chains"),
            StageOutput::RiskPredictions(_) => Some("risk_predictions"),
            StageOutput::Notification(_) => Some("notification"),
            StageOutput::Nothing => None,
        }
    }

    /// Empty contribution for the field `stage` owns
    pub fn empty_for(stage: StageId, config: &PipelineConfig) -> Self {
        match stage {
            StageId::Classify => StageOutput::Classification(Classification::default()),
            StageId::Remediate => StageOutput::Remediations(Vec::new()),
            StageId::Cookbook => StageOutput::Cookbook(String::new()),
            StageId::Ticket => StageOutput::Tickets(Vec::new()),
            StageId::RootCause => StageOutput::CausalChains(Vec::new()),
            StageId::PredictiveRisk => StageOutput::RiskPredictions(Vec::new()),
            StageId::Notify => StageOutput::Notification(Notification {
                channel: config.notify.channel.clone(),
                headline: String::new(),
                summary: String::new(),
                high_risks: Vec::new(),
                delivered: false,
            }),
        }
    }
}

/// Partial state update returned by a stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageUpdate {
    pub output: StageOutput,
    pub soft_errors: Vec<SoftError>,
}

impl StageUpdate {
    /// Update without soft errors
    pub fn new(output: StageOutput) -> Self {
        Self {
            output,
            soft_errors: Vec::new(),
        }
    }

    /// With soft errors
    #[must_use]
    pub fn with_soft_errors(mut self, soft_errors: Vec<SoftError>) -> Self {
        self.soft_errors = soft_errors;
        self
    }
}
