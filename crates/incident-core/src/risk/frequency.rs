//! Frequency acceleration
//!
//! Gaps between a service's events are "shrinking" when every gap is
//! smaller than its predecessor, allowing `gap_tolerance_secs` of slack. By
//! default every gap of the service must shrink; with
//! [`SequencePolicy::Trailing`](crate::config::SequencePolicy::Trailing) only
//! the most recent run is looked at.

use super::signal::{Signal, SignalKind};
use crate::config::RiskConfig;
use crate::timeline::{seconds_between, TimedEntry};

/// Fire when the run of shrinking gaps reaches `min_gaps`
///
/// `timed` must be one service's actionable entries in time order.
pub fn frequency_acceleration(timed: &[TimedEntry<'_>], config: &RiskConfig) -> Option<Signal> {
    if timed.len() < 3 || timed.len() <= config.min_gaps {
        return None;
    }

    let gaps: Vec<i64> = timed
        .windows(2)
        .map(|pair| seconds_between(pair[0].at, pair[1].at))
        .collect();
    let tolerance = i64::try_from(config.gap_tolerance_secs).unwrap_or(i64::MAX);

    let run = config
        .sequence_policy
        .run_len(&gaps, |earlier, later| *later < earlier.saturating_add(tolerance));
    if run < config.min_gaps.max(2) {
        return None;
    }

    let run_gaps = &gaps[gaps.len() - run..];
    let detail = run_gaps
        .iter()
        .map(|g| format!("{g}s"))
        .collect::<Vec<_>>()
        .join(" > ");
    // A run of n gaps spans n + 1 entries.
    let entries = &timed[timed.len() - run - 1..];

    tracing::debug!(service = %timed[0].entry.service, gaps = %detail, "frequency acceleration");
    Some(Signal::new(
        SignalKind::FrequencyAcceleration,
        format!("gaps {detail}"),
        entries.iter().map(|t| t.entry.line_number),
    ))
}
