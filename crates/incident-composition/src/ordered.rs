//! Last-write reducer
//!
//! The only order-dependent reducer. It backs the "last completed stage"
//! progress marker, which is display-only: nothing may branch on it.

use crate::strategy::{CompositionError, Parallelism, Reducer};
use serde::{Serialize, Serializer};

/// Last-write-wins marker with a merge counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWrite<K> {
    latest: Option<K>,
    writes: usize,
}

impl<K> Default for LastWrite<K> {
    fn default() -> Self {
        Self {
            latest: None,
            writes: 0,
        }
    }
}

impl<K> LastWrite<K> {
    /// Create an unset marker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent writer
    #[inline]
    pub fn latest(&self) -> Option<&K> {
        self.latest.as_ref()
    }

    /// Number of writes so far
    #[inline]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl<K> Reducer<K> for LastWrite<K> {
    type Input = ();

    fn reduce(&mut self, source: K, _input: ()) -> Result<(), CompositionError> {
        self.latest = Some(source);
        self.writes += 1;
        Ok(())
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::None
    }

    fn strategy(&self) -> &'static str {
        "last_write"
    }
}

impl<K: Serialize> Serialize for LastWrite<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.latest.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_latest_writer() {
        let mut marker = LastWrite::new();
        assert_eq!(marker.latest(), None);
        marker.reduce(1u8, ()).unwrap();
        marker.reduce(3u8, ()).unwrap();
        assert_eq!(marker.latest(), Some(&3));
        assert_eq!(marker.writes(), 2);
        assert!(!marker.parallelism().allows_parallel());
    }
}
