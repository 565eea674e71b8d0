//! Incident Core - single-log incident triage
//!
//! Runs one structured incident log through seven stages arranged as a
//! dependency graph and merges their findings into one [`SharedState`]:
//! - Classification, remediation, cookbook and ticket drafting
//! - Causal-chain correlation across services ([`correlation`])
//! - Escalation risk forecasting per service ([`risk`])
//! - A notification payload gated on the risk forecast
//!
//! Stages refine heuristic candidates through an injectable [`Reasoner`];
//! the offline [`RuleReasoner`] is the default.
//!
//! # Example
//!
//! ```rust,no_run
//! use incident_core::prelude::*;
//!
//! # async fn example() -> Result<(), PipelineError> {
//! let pipeline = IncidentPipeline::builder().build()?;
//!
//! let entries = vec![LogEntry::new(
//!     1,
//!     "2024-01-15 10:00:00",
//!     LogLevel::Error,
//!     "db",
//!     "disk usage 93%",
//! )];
//! let outcome = pipeline.run(PipelineInput::new(entries, Vec::new())).await?;
//!
//! println!("{} risk predictions", outcome.state.risk_predictions().len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod correlation;
pub mod error;
pub mod pipeline;
pub mod reasoner;
pub mod risk;
pub mod stages;
pub mod state;
pub mod telemetry;
pub mod timeline;
pub mod types;

pub use config::{AdjacencyPolicy, PipelineConfig, SequencePolicy};
pub use correlation::{CausalCorrelator, CorrelationCandidate};
pub use error::{ConfigError, PipelineError, ReasonerError, SoftError, SoftErrorKind, StageError};
pub use pipeline::{stage_graph, IncidentPipeline, PipelineBuilder, PipelineInput, RunOutcome};
pub use reasoner::{parse_json_reply, Reasoner, ReasonerRequest, ReasoningTask, RuleReasoner};
pub use risk::RiskDetector;
pub use stages::{Stage, StageSet};
pub use state::{SharedState, StageInput, StageOutput, StageUpdate};
pub use types::{
    CausalChain, ChainEvent, Confidence, Issue, LogEntry, LogLevel, RiskLevel, RiskPrediction, RunId, Severity,
    StageId,
};

pub use incident_kernel::{CancelReason, RunStatus};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the pipeline
    pub use crate::{
        CancelReason, CausalChain, Issue, IncidentPipeline, LogEntry, LogLevel, PipelineConfig, PipelineError,
        PipelineInput, Reasoner, ReasonerRequest, RiskLevel, RiskPrediction, RunOutcome, RunStatus, Severity,
        SoftError, SoftErrorKind, Stage, StageId, StageInput, StageUpdate,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
