//! Core types for incident triage
//!
//! Defines the domain model shared by every stage:
//! - Structured log entries and upstream issues
//! - Causal chains and risk predictions
//! - Outputs of the non-core stages
//! - Stage and run identifiers

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Canonical timestamp format of log entries
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage identifier
///
/// Ordering is declaration order; the scheduler uses it to break ties between
/// stages that become ready together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Classify,
    Remediate,
    Cookbook,
    Ticket,
    RootCause,
    PredictiveRisk,
    Notify,
}

impl StageId {
    /// Every stage, in declaration order
    pub const ALL: [StageId; 7] = [
        StageId::Classify,
        StageId::Remediate,
        StageId::Cookbook,
        StageId::Ticket,
        StageId::RootCause,
        StageId::PredictiveRisk,
        StageId::Notify,
    ];

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Classify => "classify",
            StageId::Remediate => "remediate",
            StageId::Cookbook => "cookbook",
            StageId::Ticket => "ticket",
            StageId::RootCause => "root_cause",
            StageId::PredictiveRisk => "predictive_risk",
            StageId::Notify => "notify",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage `{s}`"))
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// WARN, ERROR and CRITICAL entries are actionable
    #[inline]
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        !matches!(self, LogLevel::Info)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Structured log record produced by the upstream parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub service: String,
    pub message: String,
    pub line_number: u32,
}

impl LogEntry {
    /// Create new log entry
    pub fn new(
        line_number: u32,
        timestamp: impl Into<String>,
        level: LogLevel,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            service: service.into(),
            message: message.into(),
            line_number,
        }
    }

    /// Timestamp parsed with [`TIMESTAMP_FORMAT`], `None` when malformed
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.timestamp.trim(), TIMESTAMP_FORMAT).ok()
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Issue detected upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub description: String,
    pub severity: Severity,
    /// Line number of the originating log entry
    #[serde(default)]
    pub line_number: Option<u32>,
}

impl Issue {
    /// Create new issue
    pub fn new(description: impl Into<String>, severity: Severity) -> Self {
        Self {
            description: description.into(),
            severity,
            line_number: None,
        }
    }

    /// With originating log line
    #[must_use]
    pub fn at_line(mut self, line_number: u32) -> Self {
        self.line_number = Some(line_number);
        self
    }
}

/// Three-level scale shared by chain confidence and risk level
macro_rules! graded {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum $name {
            Low,
            Medium,
            High,
        }

        impl $name {
            /// Parse a reasoner-supplied label in any case; anything
            /// unrecognised (or missing) is MEDIUM
            pub fn from_label(label: Option<&str>) -> Self {
                label
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or($name::Medium)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    "HIGH" => Ok($name::High),
                    "MEDIUM" => Ok($name::Medium),
                    "LOW" => Ok($name::Low),
                    other => Err(format!("unknown level `{other}`")),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $name::High => "HIGH",
                    $name::Medium => "MEDIUM",
                    $name::Low => "LOW",
                };
                f.write_str(name)
            }
        }
    };
}

graded!(
    /// Confidence in a causal chain
    Confidence
);
graded!(
    /// Escalation risk of a service
    RiskLevel
);

/// One event of a causal chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub service: String,
    pub event: String,
    pub timestamp: String,
    pub line_number: u32,
}

impl From<&LogEntry> for ChainEvent {
    fn from(entry: &LogEntry) -> Self {
        Self {
            service: entry.service.clone(),
            event: entry.message.clone(),
            timestamp: entry.timestamp.clone(),
            line_number: entry.line_number,
        }
    }
}

/// Directed cause-to-effect sequence of events
///
/// `affected_services` and `blast_radius` are derived from the events on
/// construction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CausalChain {
    #[serde(rename = "chain")]
    events: Vec<ChainEvent>,
    root_cause: String,
    blast_radius: usize,
    affected_services: BTreeSet<String>,
    confidence: Confidence,
    summary: String,
}

impl CausalChain {
    /// Build a chain; `None` when `events` is empty
    pub fn new(
        events: Vec<ChainEvent>,
        root_cause: impl Into<String>,
        confidence: Confidence,
        summary: impl Into<String>,
    ) -> Option<Self> {
        if events.is_empty() {
            return None;
        }
        let affected_services: BTreeSet<String> =
            events.iter().map(|e| e.service.clone()).collect();
        Some(Self {
            blast_radius: affected_services.len(),
            events,
            root_cause: root_cause.into(),
            affected_services,
            confidence,
            summary: summary.into(),
        })
    }

    /// Events, earliest cause first
    pub fn events(&self) -> &[ChainEvent] {
        &self.events
    }

    pub fn root_cause(&self) -> &str {
        &self.root_cause
    }

    /// Number of distinct services touched
    pub fn blast_radius(&self) -> usize {
        self.blast_radius
    }

    pub fn affected_services(&self) -> &BTreeSet<String> {
        &self.affected_services
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

/// Forecast escalation of a single service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub service: String,
    pub risk_level: RiskLevel,
    pub prediction: String,
    /// Concrete supporting log lines
    pub evidence: Vec<String>,
    pub preventive_action: String,
    pub time_horizon: String,
}

/// Deterministic overview produced by the classify stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub total_entries: usize,
    pub level_counts: BTreeMap<LogLevel, usize>,
    /// Distinct services in first-seen order
    pub services: Vec<String>,
    pub actionable_entries: usize,
    pub issue_count: usize,
    pub highest_severity: Option<Severity>,
}

/// Suggested fix for one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    pub issue: String,
    pub severity: Severity,
    pub steps: Vec<String>,
    pub rationale: String,
}

/// Ticket ready to be filed by an external tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    pub severity: Severity,
    pub body: String,
    pub labels: Vec<String>,
}

/// Notification payload; delivery happens outside the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: String,
    pub headline: String,
    pub summary: String,
    /// HIGH risk predictions; always present, possibly empty
    pub high_risks: Vec<RiskPrediction>,
    pub delivered: bool,
}
