//! Time-ordered view of log entries

use crate::error::{SoftError, SoftErrorKind};
use crate::types::{LogEntry, StageId};
use chrono::NaiveDateTime;

/// Entry paired with its parsed timestamp
#[derive(Debug, Clone, Copy)]
pub struct TimedEntry<'a> {
    pub at: NaiveDateTime,
    pub entry: &'a LogEntry,
}

/// Entries with a parseable timestamp, sorted by (timestamp, line number),
/// plus the line numbers that could not be placed in time
#[derive(Debug, Clone, Default)]
pub struct Timeline<'a> {
    pub timed: Vec<TimedEntry<'a>>,
    pub unparseable: Vec<u32>,
}

impl<'a> Timeline<'a> {
    pub fn build(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        let mut timeline = Timeline::default();
        for entry in entries {
            match entry.parsed_timestamp() {
                Some(at) => timeline.timed.push(TimedEntry { at, entry }),
                None => timeline.unparseable.push(entry.line_number),
            }
        }
        timeline
            .timed
            .sort_by_key(|t| (t.at, t.entry.line_number));
        timeline.unparseable.sort_unstable();
        timeline
    }

    /// One aggregated soft error for every excluded entry, if any
    pub fn unparseable_error(&self, stage: StageId) -> Option<SoftError> {
        unparseable_error(stage, &self.unparseable)
    }
}

/// Aggregated soft error for entries excluded by timestamp
pub fn unparseable_error(stage: StageId, lines: &[u32]) -> Option<SoftError> {
    if lines.is_empty() {
        return None;
    }
    Some(SoftError::new(
        stage,
        SoftErrorKind::UnparseableTimestamp,
        format!(
            "{} entries excluded from time-based analysis, lines {:?}",
            lines.len(),
            lines
        ),
    ))
}

/// Whole seconds from `earlier` to `later`
pub fn seconds_between(earlier: NaiveDateTime, later: NaiveDateTime) -> i64 {
    (later - earlier).num_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;

    #[test]
    fn sorts_by_time_then_line_and_collects_failures() {
        let entries = vec![
            LogEntry::new(3, "2024-01-01 10:00:10", LogLevel::Error, "a", "x"),
            LogEntry::new(1, "yesterday", LogLevel::Error, "a", "x"),
            LogEntry::new(4, "2024-01-01 10:00:00", LogLevel::Error, "a", "x"),
            LogEntry::new(2, "2024-01-01 10:00:00", LogLevel::Error, "a", "x"),
        ];
        let timeline = Timeline::build(&entries);

        let lines: Vec<u32> = timeline.timed.iter().map(|t| t.entry.line_number).collect();
        assert_eq!(lines, vec![2, 4, 3]);
        assert_eq!(timeline.unparseable, vec![1]);

        let err = timeline.unparseable_error(StageId::RootCause).unwrap();
        assert_eq!(err.kind, SoftErrorKind::UnparseableTimestamp);
        assert!(err.message.contains("[1]"));
    }

    #[test]
    fn no_error_when_everything_parses() {
        let entries = vec![LogEntry::new(1, "2024-01-01 10:00:00", LogLevel::Warn, "a", "x")];
        assert!(Timeline::build(&entries).unparseable_error(StageId::PredictiveRisk).is_none());
    }
}
