//! Temporal clustering
//!
//! Cluster membership is the transitive closure of "within the window of
//! each other". On a sorted time line that closure is exactly the runs of
//! entries whose consecutive gaps are all within the window.

use crate::timeline::{seconds_between, TimedEntry};

/// Split time-sorted entries into connected components of the
/// within-`window_secs` relation (inclusive)
pub fn temporal_clusters<'a>(sorted: &[TimedEntry<'a>], window_secs: u64) -> Vec<Vec<TimedEntry<'a>>> {
    let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
    let mut clusters: Vec<Vec<TimedEntry<'a>>> = Vec::new();

    for timed in sorted {
        match clusters.last_mut() {
            Some(current)
                if current
                    .last()
                    .is_some_and(|prev| seconds_between(prev.at, timed.at) <= window) =>
            {
                current.push(*timed);
            }
            _ => clusters.push(vec![*timed]),
        }
    }
    clusters
}
