//! Known escalation signatures
//!
//! Exactly four: brute force, retry escalation, critical disk and pool
//! exhaustion. Entries matching none of them are left to the other
//! detectors.

use super::signal::{Signal, SignalKind};
use super::trend::percentages;
use crate::config::RiskConfig;
use crate::timeline::{seconds_between, TimedEntry};
use crate::types::LogEntry;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

// The failure word must qualify the auth word directly; "call to auth-service failed" is not a login failure.
static AUTH_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:authentication|authorization|auth|login|logon|sign-?in|credentials?|password)\s+(?:attempts?\s+)?
            (?:failed|failure|denied|rejected|invalid)\b
        | \b(?:failed|invalid|bad|unsuccessful|wrong|incorrect)\s+
            (?:authentication|auth|login|logon|sign-?in|password|credentials?)\b
        | \bbrute\s*force\b
        | \bfailed\s+(?:login\s+)?attempts\b",
    )
    .expect("valid regex")
});
static RETRY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bretry(?:ing)?\s*(?:attempt\s*)?#?(\d+)").expect("valid regex"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static RATIO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("valid regex"));

const DISK_WORDS: [&str; 6] = ["disk", "storage", "volume", "filesystem", "utilization", "usage"];

/// All signatures for one service
///
/// `timed` is the service's actionable entries in time order, `ordered`
/// the same entries in log order.
pub fn known_patterns(timed: &[TimedEntry<'_>], ordered: &[&LogEntry], config: &RiskConfig) -> Vec<Signal> {
    let mut signals = Vec::new();
    signals.extend(brute_force(timed, config));
    signals.extend(retry_escalation(ordered, config));
    signals.extend(disk_critical(ordered, config));
    signals.extend(pool_exhaustion(ordered, config));
    signals
}

/// Whether `message` reports a failed authentication or login
pub fn is_auth_failure(message: &str) -> bool {
    AUTH_FAILURE.is_match(message)
}

/// `brute_force_min` authentication failures within `window_secs`
pub fn brute_force(timed: &[TimedEntry<'_>], config: &RiskConfig) -> Option<Signal> {
    let failures: Vec<&TimedEntry<'_>> = timed.iter().filter(|t| is_auth_failure(&t.entry.message)).collect();
    if failures.len() < config.brute_force_min.max(1) {
        return None;
    }

    let window = i64::try_from(config.window_secs).unwrap_or(i64::MAX);
    let mut best = (0, 0);
    let mut start = 0;
    for end in 0..failures.len() {
        while seconds_between(failures[start].at, failures[end].at) > window {
            start += 1;
        }
        if end + 1 - start > best.1 - best.0 {
            best = (start, end + 1);
        }
    }

    let burst = &failures[best.0..best.1];
    if burst.len() < config.brute_force_min {
        return None;
    }
    Some(Signal::new(
        SignalKind::BruteForce,
        format!(
            "{} authentication failures within {}s",
            burst.len(),
            seconds_between(burst[0].at, burst[burst.len() - 1].at)
        ),
        burst.iter().map(|t| t.entry.line_number),
    ))
}

/// Strictly increasing retry counts for the same operation
///
/// The operation is the message with every number masked.
pub fn retry_escalation(ordered: &[&LogEntry], config: &RiskConfig) -> Vec<Signal> {
    let mut operations: IndexMap<String, Vec<(u64, u32)>> = IndexMap::new();
    for entry in ordered {
        let Some(count) = RETRY_COUNT
            .captures(&entry.message)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
        else {
            continue;
        };
        let template = DIGITS.replace_all(&entry.message.to_lowercase(), "#").into_owned();
        operations.entry(template).or_default().push((count, entry.line_number));
    }

    operations
        .into_iter()
        .filter(|(_, observed)| {
            observed.len() >= config.retry_min_observations.max(2) && observed.windows(2).all(|w| w[1].0 > w[0].0)
        })
        .map(|(template, observed)| {
            let counts: Vec<String> = observed.iter().map(|(c, _)| c.to_string()).collect();
            Signal::new(
                SignalKind::RetryEscalation,
                format!("retries {} for `{template}`", counts.join(" -> ")),
                observed.iter().map(|(_, line)| *line),
            )
        })
        .collect()
}

/// Disk or utilization reading strictly above `disk_threshold_pct`
pub fn disk_critical(ordered: &[&LogEntry], config: &RiskConfig) -> Option<Signal> {
    let readings: Vec<(f64, u32)> = ordered
        .iter()
        .filter_map(|entry| disk_reading(&entry.message).map(|pct| (pct, entry.line_number)))
        .filter(|(pct, _)| *pct > config.disk_threshold_pct)
        .collect();

    let peak = readings.iter().map(|(pct, _)| *pct).fold(f64::NAN, f64::max);
    (!readings.is_empty()).then(|| {
        Signal::new(
            SignalKind::DiskCritical,
            format!("usage peaked at {peak}% (threshold {}%)", config.disk_threshold_pct),
            readings.iter().map(|(_, line)| *line),
        )
    })
}

/// Highest used percentage in a disk/utilization message
///
/// Percentages qualified as free or available capacity do not count.
pub fn disk_reading(message: &str) -> Option<f64> {
    let lower = message.to_lowercase();
    if !DISK_WORDS.iter().any(|w| lower.contains(w)) {
        return None;
    }
    percentages(message)
        .into_iter()
        .filter(|p| !p.free)
        .map(|p| p.value)
        .reduce(f64::max)
}

/// Connection pool usage strictly above `pool_threshold` of capacity
pub fn pool_exhaustion(ordered: &[&LogEntry], config: &RiskConfig) -> Option<Signal> {
    let readings: Vec<(u64, u64, u32)> = ordered
        .iter()
        .filter_map(|entry| {
            let (used, total) = pool_reading(&entry.message)?;
            let exhausted = used as f64 / total as f64 > config.pool_threshold;
            exhausted.then_some((used, total, entry.line_number))
        })
        .collect();

    let (used, total, _) = *readings.last()?;
    Some(Signal::new(
        SignalKind::PoolExhaustion,
        format!("pool at {used}/{total} (threshold {:.0}%)", config.pool_threshold * 100.0),
        readings.iter().map(|(_, _, line)| *line),
    ))
}

/// `used/total` pair from a message about a connection pool
pub fn pool_reading(message: &str) -> Option<(u64, u64)> {
    let lower = message.to_lowercase();
    if !(lower.contains("pool") || lower.contains("connection")) {
        return None;
    }
    let caps = RATIO.captures(message)?;
    let used = caps.get(1)?.as_str().parse().ok()?;
    let total: u64 = caps.get(2)?.as_str().parse().ok()?;
    (total > 0).then_some((used, total))
}
