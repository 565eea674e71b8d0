//! Commutative reducers
//!
//! Order-independent merges for list-typed and set-typed fields. Each
//! contribution is stored under the tag of the source that produced it and
//! read back in tag order, so the merged value does not depend on the order
//! in which concurrent sources completed.

use crate::strategy::{CompositionError, Parallelism, Reducer};
use im::{OrdMap, OrdSet, Vector};
use serde::{Serialize, Serializer};
use std::fmt;

/// Append-only list with per-source provenance
///
/// # Characteristics
/// - Commutative and associative across sources
/// - Each source contributes at most once
/// - O(1) clone (structural sharing)
#[derive(Clone, PartialEq, Eq)]
pub struct ProvenanceLog<K: Ord + Clone, T: Clone> {
    field: &'static str,
    entries: OrdMap<K, Vector<T>>,
}

impl<K: Ord + Clone, T: Clone> ProvenanceLog<K, T> {
    /// Create an empty log for `field`
    #[inline]
    #[must_use]
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            entries: OrdMap::new(),
        }
    }

    /// Field name this log backs
    #[inline]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Whether `source` has contributed
    #[inline]
    pub fn has_contribution(&self, source: &K) -> bool {
        self.entries.contains_key(source)
    }

    /// Items contributed by `source`
    pub fn contribution(&self, source: &K) -> Option<&Vector<T>> {
        self.entries.get(source)
    }

    /// All items, grouped by source in tag order, in contribution order
    /// within each source
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values().flat_map(|items| items.iter())
    }

    /// Items with their source tag
    pub fn iter_tagged(&self) -> impl Iterator<Item = (&K, &T)> + '_ {
        self.entries
            .iter()
            .flat_map(|(source, items)| items.iter().map(move |item| (source, item)))
    }

    /// Total number of items
    pub fn len(&self) -> usize {
        self.entries.values().map(Vector::len).sum()
    }

    /// Whether no items were contributed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sources that contributed (including empty contributions)
    pub fn source_count(&self) -> usize {
        self.entries.len()
    }

    /// Flatten into an owned vector
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<K, T> Reducer<K> for ProvenanceLog<K, T>
where
    K: Ord + Clone + fmt::Display,
    T: Clone,
{
    type Input = Vec<T>;

    fn reduce(&mut self, source: K, input: Vec<T>) -> Result<(), CompositionError> {
        if self.entries.contains_key(&source) {
            return Err(CompositionError::duplicate(self.field, source));
        }
        self.entries.insert(source, input.into_iter().collect());
        Ok(())
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Full
    }

    fn strategy(&self) -> &'static str {
        "provenance_append"
    }
}

impl<K: Ord + Clone + fmt::Debug, T: Clone + fmt::Debug> fmt::Debug for ProvenanceLog<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// Serialized as the flat item sequence; provenance is an internal detail.
impl<K: Ord + Clone, T: Clone + Serialize> Serialize for ProvenanceLog<K, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Set of sources that have completed
///
/// Union is commutative; marking the same source twice is rejected so that
/// exactly-once execution is observable in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSet<K: Ord + Clone> {
    done: OrdSet<K>,
}

impl<K: Ord + Clone> Default for CompletionSet<K> {
    fn default() -> Self {
        Self { done: OrdSet::new() }
    }
}

impl<K: Ord + Clone> CompletionSet<K> {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source` is marked complete
    #[inline]
    pub fn contains(&self, source: &K) -> bool {
        self.done.contains(source)
    }

    /// Completed sources in tag order
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.done.iter()
    }

    /// Number of completed sources
    pub fn len(&self) -> usize {
        self.done.len()
    }

    /// Whether nothing has completed yet
    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}

impl<K: Ord + Clone + fmt::Display> Reducer<K> for CompletionSet<K> {
    type Input = ();

    fn reduce(&mut self, source: K, _input: ()) -> Result<(), CompositionError> {
        if self.done.contains(&source) {
            return Err(CompositionError::duplicate("completed", source));
        }
        self.done.insert(source);
        Ok(())
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Full
    }

    fn strategy(&self) -> &'static str {
        "completion_union"
    }
}

impl<K: Ord + Clone + Serialize> Serialize for CompletionSet<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.done.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_back_in_tag_order() {
        let mut log: ProvenanceLog<u8, &str> = ProvenanceLog::new("chains");
        log.reduce(2, vec!["c"]).unwrap();
        log.reduce(1, vec!["a", "b"]).unwrap();

        assert_eq!(log.to_vec(), vec!["a", "b", "c"]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.source_count(), 2);
        assert_eq!(
            log.iter_tagged().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, "a"), (1, "b"), (2, "c")]
        );
    }

    #[test]
    fn empty_contribution_is_recorded() {
        let mut log: ProvenanceLog<u8, u32> = ProvenanceLog::new("risks");
        log.reduce(4, Vec::new()).unwrap();
        assert!(log.is_empty());
        assert!(log.has_contribution(&4));
    }

    #[test]
    fn rejects_second_contribution_without_mutating() {
        let mut log: ProvenanceLog<u8, u32> = ProvenanceLog::new("risks");
        log.reduce(1, vec![10]).unwrap();
        let before = log.clone();

        let err = log.reduce(1, vec![11]).unwrap_err();
        assert_eq!(err, CompositionError::duplicate("risks", 1));
        assert_eq!(log, before);
    }

    #[test]
    fn serializes_as_flat_sequence() {
        let mut log: ProvenanceLog<u8, u32> = ProvenanceLog::new("values");
        log.reduce(1, vec![1, 2]).unwrap();
        log.reduce(0, vec![0]).unwrap();
        assert_eq!(serde_json::to_string(&log).unwrap(), "[0,1,2]");
    }

    #[test]
    fn completion_set_marks_once() {
        let mut done = CompletionSet::new();
        done.reduce("classify", ()).unwrap();
        assert!(done.contains(&"classify"));
        assert!(done.reduce("classify", ()).is_err());
        assert_eq!(done.len(), 1);
    }
}
