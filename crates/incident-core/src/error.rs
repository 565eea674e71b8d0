//! Error types for incident triage
//!
//! Three tiers:
//! - Configuration errors ([`PipelineError::Configuration`], [`ConfigError`]):
//!   fatal, raised before any stage runs
//! - Stage errors ([`StageError`], [`ReasonerError`]): isolated to one stage or
//!   one record and surfaced as [`SoftError`] diagnostics
//! - Cancellation: reported through the run status, never as an error

use crate::types::StageId;
use incident_composition::CompositionError;
use incident_kernel::GraphError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed stage graph
    #[error("invalid stage graph: {0}")]
    Configuration(#[from] GraphError),

    /// Invalid pipeline configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input rejected before the run started
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is not valid TOML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of the reasoning capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReasonerError {
    /// The back end could not be reached or refused the request
    #[error("reasoner unavailable: {0}")]
    Unavailable(String),

    /// The back end answered with something that is not structured JSON
    #[error("reasoner returned invalid reply: {0}")]
    InvalidReply(String),

    /// The back end does not handle this kind of task
    #[error("reasoner does not support task `{0}`")]
    Unsupported(String),
}

/// Stage-level failure
///
/// Returned by a stage when it cannot produce any output at all. The
/// scheduler records it and merges the stage's empty contribution instead.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A reasoner call the stage cannot do without failed
    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    /// Stage-specific failure
    #[error("{0}")]
    Failed(String),
}

/// Merge rejected by the reducer set
pub type MergeError = CompositionError;

/// Category of a recoverable error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftErrorKind {
    /// A reasoner call failed
    ReasonerFailed,
    /// A reasoner reply did not have the expected shape
    MalformedReasonerOutput,
    /// Entries were excluded because their timestamp could not be parsed
    UnparseableTimestamp,
    /// The whole stage failed or panicked; its contribution is empty
    StageFailed,
    /// The stage's update was rejected at merge time
    MergeRejected,
}

impl fmt::Display for SoftErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoftErrorKind::ReasonerFailed => "reasoner_failed",
            SoftErrorKind::MalformedReasonerOutput => "malformed_reasoner_output",
            SoftErrorKind::UnparseableTimestamp => "unparseable_timestamp",
            SoftErrorKind::StageFailed => "stage_failed",
            SoftErrorKind::MergeRejected => "merge_rejected",
        };
        f.write_str(name)
    }
}

/// Recoverable error recorded for visibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftError {
    pub stage: StageId,
    pub kind: SoftErrorKind,
    pub message: String,
}

impl SoftError {
    /// Create new soft error
    pub fn new(stage: StageId, kind: SoftErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.kind, self.message)
    }
}
