//! Numeric trend extraction

use super::signal::{Metric, Signal, SignalKind};
use crate::config::RiskConfig;
use crate::types::LogEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid regex"));
// Up to two words between the number and the qualifier: "5% disk space free".
static FREE_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[a-z]+\s+){0,2}(?:free|available|remaining|left)\b").expect("valid regex")
});
static USED_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:used|in\s+use|full|utilized)\b").expect("valid regex"));
static FREE_BEFORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:free|available|remaining)\b[^\d%]{0,12}$").expect("valid regex"));
static LATENCY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*ms\b").expect("valid regex"));
static RETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bretry(?:ing)?\s*(?:attempt\s*)?#?(\d+)").expect("valid regex"));
static POOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s*/\s*(\d+)\s*connections?").expect("valid regex"));

/// Single numeric value read from a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub metric: Metric,
    /// Percent for utilization and free capacity, a 0..=1 ratio for pool usage
    pub value: f64,
    /// Line the value was read from
    pub line: u32,
}

/// Percentage found in a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentage {
    /// Number before the `%`
    pub value: f64,
    /// Qualified as free, available or remaining capacity
    pub free: bool,
}

/// Every percentage in `message`, each classified on its own
///
/// A qualifier right after the number decides first ("8% free", "92% used"),
/// then one shortly before it ("available: 12%").
pub fn percentages(message: &str) -> Vec<Percentage> {
    PERCENT
        .captures_iter(message)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.get(1)?.as_str().parse().ok()?;
            let after = &message[whole.end()..];
            let free = if FREE_AFTER.is_match(after) {
                true
            } else if USED_AFTER.is_match(after) {
                false
            } else {
                FREE_BEFORE.is_match(&message[..whole.start()])
            };
            Some(Percentage { value, free })
        })
        .collect()
}

/// First value per metric found in `entry.message`
///
/// A message may carry both a used and a free percentage.
pub fn extract(entry: &LogEntry) -> Vec<Reading> {
    let message = entry.message.as_str();
    let line = entry.line_number;
    let mut readings = Vec::new();

    let percents = percentages(message);
    if let Some(used) = percents.iter().find(|p| !p.free) {
        readings.push(Reading {
            metric: Metric::Utilization,
            value: used.value,
            line,
        });
    }
    if let Some(free) = percents.iter().find(|p| p.free) {
        readings.push(Reading {
            metric: Metric::FreeCapacity,
            value: free.value,
            line,
        });
    }
    if let Some(value) = first_number(&LATENCY, message) {
        readings.push(Reading {
            metric: Metric::LatencyMs,
            value,
            line,
        });
    }
    if let Some(value) = first_number(&RETRY, message) {
        readings.push(Reading {
            metric: Metric::RetryCount,
            value,
            line,
        });
    }
    if let Some((used, total)) = pool_ratio(message) {
        readings.push(Reading {
            metric: Metric::PoolUsage,
            value: used / total,
            line,
        });
    }
    readings
}

/// `used / total connections` pair with a non-zero total
pub fn pool_ratio(message: &str) -> Option<(f64, f64)> {
    let caps = POOL.captures(message)?;
    let used: f64 = caps.get(1)?.as_str().parse().ok()?;
    let total: f64 = caps.get(2)?.as_str().parse().ok()?;
    (total > 0.0).then_some((used, total))
}

fn first_number(pattern: &Regex, message: &str) -> Option<f64> {
    pattern.captures(message)?.get(1)?.as_str().parse().ok()
}

/// Trend signals for one service's actionable entries in log order
pub fn trends(entries: &[&LogEntry], config: &RiskConfig) -> Vec<Signal> {
    let mut series: BTreeMap<Metric, Vec<Reading>> = BTreeMap::new();
    for entry in entries {
        for reading in extract(entry) {
            series.entry(reading.metric).or_default().push(reading);
        }
    }

    series
        .into_iter()
        .filter_map(|(metric, readings)| worsening_trend(metric, &readings, config))
        .collect()
}

/// Strictly worsening readings, the whole series or its last run per `sequence_policy`
fn worsening_trend(metric: Metric, readings: &[Reading], config: &RiskConfig) -> Option<Signal> {
    let run = config.sequence_policy.run_len(readings, |earlier, later| {
        if metric.lower_is_worse() {
            later.value < earlier.value
        } else {
            later.value > earlier.value
        }
    });
    if run < config.min_trend_points.max(2) {
        return None;
    }

    let points = &readings[readings.len() - run..];
    let detail = points
        .iter()
        .map(|r| format_value(metric, r.value))
        .collect::<Vec<_>>()
        .join(" -> ");
    let direction = if metric.lower_is_worse() { "falling" } else { "rising" };

    Some(Signal::new(
        SignalKind::Trend(metric),
        format!("{metric} {direction}: {detail}"),
        points.iter().map(|r| r.line),
    ))
}

fn format_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::PoolUsage => format!("{:.0}%", value * 100.0),
        Metric::Utilization | Metric::FreeCapacity => format!("{value}%"),
        Metric::LatencyMs => format!("{value}ms"),
        Metric::RetryCount => format!("{value}"),
    }
}
