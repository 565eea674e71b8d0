//! Escalation signals and per-service evidence bundles

use crate::reasoner::excerpt;
use crate::types::LogEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Evidence lines keep at most this many characters of the message
pub const EVIDENCE_EXCERPT_CHARS: usize = 80;

/// Supporting lines recorded per signal
pub const MAX_SIGNAL_LINES: usize = 5;

/// Numeric quantity tracked by the trend detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    /// Disk, CPU or memory utilization percentage
    Utilization,
    /// Remaining capacity percentage; lower is worse
    FreeCapacity,
    /// Latency in milliseconds
    LatencyMs,
    /// Retry attempt number
    RetryCount,
    /// used / total connection ratio
    PoolUsage,
}

impl Metric {
    /// Name used in signal details and evidence
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Utilization => "utilization",
            Metric::FreeCapacity => "free_capacity",
            Metric::LatencyMs => "latency_ms",
            Metric::RetryCount => "retry_count",
            Metric::PoolUsage => "pool_usage",
        }
    }

    /// Whether a falling value signals escalation
    pub fn lower_is_worse(&self) -> bool {
        matches!(self, Metric::FreeCapacity)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of fired escalation signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalKind {
    /// Gaps between actionable events shrinking
    FrequencyAcceleration,
    /// Metric moving monotonically in its bad direction
    Trend(Metric),
    /// Authentication failures bunched inside the risk window
    BruteForce,
    /// Same operation retried with climbing attempt numbers
    RetryEscalation,
    /// Disk usage above the threshold
    DiskCritical,
    /// Connection pool usage above the threshold
    PoolExhaustion,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::FrequencyAcceleration => f.write_str("frequency_acceleration"),
            SignalKind::Trend(metric) => write!(f, "trend:{metric}"),
            SignalKind::BruteForce => f.write_str("brute_force"),
            SignalKind::RetryEscalation => f.write_str("retry_escalation"),
            SignalKind::DiskCritical => f.write_str("disk_critical"),
            SignalKind::PoolExhaustion => f.write_str("pool_exhaustion"),
        }
    }
}

impl Serialize for SignalKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One fired signal with its supporting log lines
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    #[serde(rename = "signal")]
    pub kind: SignalKind,
    /// Human-readable measurement, e.g. "gaps 30s > 20s > 10s"
    pub detail: String,
    pub lines: Vec<u32>,
}

impl Signal {
    /// Keeps the last [`MAX_SIGNAL_LINES`] supporting lines
    pub fn new(kind: SignalKind, detail: impl Into<String>, lines: impl IntoIterator<Item = u32>) -> Self {
        let mut lines: Vec<u32> = lines.into_iter().collect();
        if lines.len() > MAX_SIGNAL_LINES {
            lines.drain(..lines.len() - MAX_SIGNAL_LINES);
        }
        Self {
            kind,
            detail: detail.into(),
            lines,
        }
    }
}

/// Every signal fired for one service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceBundle {
    pub service: String,
    pub signals: Vec<Signal>,
    /// `line <n> [<signal>]: <excerpt>` references
    pub evidence: Vec<String>,
}

impl EvidenceBundle {
    /// Bundle `signals`, resolving their lines against the service's entries
    pub fn new(service: impl Into<String>, signals: Vec<Signal>, entries: &[&LogEntry]) -> Self {
        let messages: BTreeMap<u32, &str> = entries
            .iter()
            .map(|e| (e.line_number, e.message.as_str()))
            .collect();

        let evidence = signals
            .iter()
            .flat_map(|signal| {
                let messages = &messages;
                signal.lines.iter().map(move |line| {
                    let message = messages.get(line).copied().unwrap_or_default();
                    format!(
                        "line {line} [{}]: {}",
                        signal.kind,
                        excerpt(message, EVIDENCE_EXCERPT_CHARS)
                    )
                })
            })
            .collect();

        Self {
            service: service.into(),
            signals,
            evidence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
