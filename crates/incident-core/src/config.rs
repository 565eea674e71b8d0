//! Pipeline configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Unknown keys are rejected.

use crate::error::ConfigError;
use crate::types::Severity;
use incident_kernel::prelude::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub correlation: CorrelationConfig,
    pub risk: RiskConfig,
    pub scheduler: SchedulerSettings,
    pub remediation: RemediationConfig,
    pub ticket: TicketConfig,
    pub notify: NotifyConfig,
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.correlation;
        if c.window_secs == 0 {
            return Err(ConfigError::invalid("correlation.window_secs", "must be positive"));
        }
        if c.min_cluster_size < 2 {
            return Err(ConfigError::invalid("correlation.min_cluster_size", "must be at least 2"));
        }
        if c.min_services < 1 {
            return Err(ConfigError::invalid("correlation.min_services", "must be at least 1"));
        }

        let r = &self.risk;
        if r.window_secs == 0 {
            return Err(ConfigError::invalid("risk.window_secs", "must be positive"));
        }
        if r.min_gaps == 0 {
            return Err(ConfigError::invalid("risk.min_gaps", "must be at least 1"));
        }
        if r.min_trend_points < 2 {
            return Err(ConfigError::invalid("risk.min_trend_points", "must be at least 2"));
        }
        if !(r.disk_threshold_pct > 0.0 && r.disk_threshold_pct <= 100.0) {
            return Err(ConfigError::invalid("risk.disk_threshold_pct", "must be in (0, 100]"));
        }
        if !(r.pool_threshold > 0.0 && r.pool_threshold <= 1.0) {
            return Err(ConfigError::invalid("risk.pool_threshold", "must be in (0, 1]"));
        }
        if r.brute_force_min == 0 {
            return Err(ConfigError::invalid("risk.brute_force_min", "must be at least 1"));
        }
        if r.retry_min_observations < 2 {
            return Err(ConfigError::invalid("risk.retry_min_observations", "must be at least 2"));
        }

        if self.scheduler.timeout_secs == Some(0) {
            return Err(ConfigError::invalid("scheduler.timeout_secs", "must be positive"));
        }
        if self.scheduler.max_parallel == Some(0) {
            return Err(ConfigError::invalid("scheduler.max_parallel", "must be positive"));
        }
        if self.notify.channel.trim().is_empty() {
            return Err(ConfigError::invalid("notify.channel", "must not be empty"));
        }
        Ok(())
    }
}

/// What to do with temporal clusters whose services do not reference each
/// other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyPolicy {
    /// Drop them
    #[default]
    Strict,
    /// Still synthesize a chain, with confidence forced to LOW
    SurfaceLowConfidence,
}

/// Causal Correlator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationConfig {
    /// Two entries this close (inclusive) share a cluster
    pub window_secs: u64,
    pub min_cluster_size: usize,
    /// Distinct services a candidate must span
    pub min_services: usize,
    pub adjacency_policy: AdjacencyPolicy,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            min_cluster_size: 2,
            min_services: 2,
            adjacency_policy: AdjacencyPolicy::Strict,
        }
    }
}

/// How much of a gap or value sequence must be monotonic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencePolicy {
    /// Every step of the service's sequence
    #[default]
    Whole,
    /// Only the most recent run; an earlier calm period does not mask a burst
    Trailing,
}

impl SequencePolicy {
    /// Length of the run of `items` that qualifies under this policy
    ///
    /// `step` decides whether one item may follow another. Under
    /// [`SequencePolicy::Whole`] a single bad step leaves a run of one.
    pub fn run_len<T>(self, items: &[T], step: impl Fn(&T, &T) -> bool) -> usize {
        if items.is_empty() {
            return 0;
        }
        match self {
            Self::Whole => {
                if items.windows(2).all(|pair| step(&pair[0], &pair[1])) {
                    items.len()
                } else {
                    1
                }
            }
            Self::Trailing => {
                1 + items
                    .windows(2)
                    .rev()
                    .take_while(|pair| step(&pair[0], &pair[1]))
                    .count()
            }
        }
    }
}

/// Risk Detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Window for the brute-force signature
    pub window_secs: u64,
    /// Consecutive shrinking gaps needed for frequency acceleration
    pub min_gaps: usize,
    /// A gap may exceed its predecessor by less than this and still count
    /// as shrinking
    pub gap_tolerance_secs: u64,
    /// Consecutive monotonic values needed for a numeric trend
    pub min_trend_points: usize,
    pub disk_threshold_pct: f64,
    pub pool_threshold: f64,
    pub brute_force_min: usize,
    pub retry_min_observations: usize,
    /// Applies to frequency acceleration and numeric trends
    pub sequence_policy: SequencePolicy,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            min_gaps: 3,
            gap_tolerance_secs: 0,
            min_trend_points: 3,
            disk_threshold_pct: 80.0,
            pool_threshold: 0.75,
            brute_force_min: 3,
            retry_min_observations: 2,
            sequence_policy: SequencePolicy::Whole,
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Run-level deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Maximum stages in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

impl SchedulerSettings {
    /// Kernel scheduler configuration
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::default();
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_parallel {
            config = config.with_max_parallel(max);
        }
        config
    }
}

/// Remediation stage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemediationConfig {
    /// Only the first `max_issues` issues get a remediation
    pub max_issues: usize,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self { max_issues: 10 }
    }
}

/// Ticket drafting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketConfig {
    /// Issues at or above this severity get a ticket
    pub min_severity: Severity,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::High,
        }
    }
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    /// Channel named in the notification; nothing is delivered from here
    pub channel: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel: "#incidents".to_string(),
        }
    }
}
