//! Incident Composition
//!
//! Per-field merge functions for the shared incident state.
//!
//! # Core Concepts
//!
//! - [`Reducer`]: merge one tagged contribution into a field
//! - [`ProvenanceLog`]: commutative append for list fields
//! - [`CompletionSet`]: commutative per-stage completion markers
//! - [`OwnedSlot`]: single-writer scalar fields
//! - [`LastWrite`]: display-only progress marker
//! - [`OwnershipRegistry`]: which source may write which field
//!
//! # Example
//!
//! ```rust
//! use incident_composition::{ProvenanceLog, Reducer};
//!
//! let mut chains: ProvenanceLog<u8, &str> = ProvenanceLog::new("causal_chains");
//! chains.reduce(2, vec!["late"]).unwrap();
//! chains.reduce(1, vec!["early"]).unwrap();
//! assert_eq!(chains.to_vec(), vec!["early", "late"]);
//! ```

mod commutative;
mod ordered;
mod registry;
mod single_writer;
mod strategy;

pub use commutative::{CompletionSet, ProvenanceLog};
pub use ordered::LastWrite;
pub use registry::OwnershipRegistry;
pub use single_writer::OwnedSlot;
pub use strategy::{CompositionError, Parallelism, Reducer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Fields {
        chains: ProvenanceLog<u8, u32>,
        done: CompletionSet<u8>,
    }

    fn merge_all(order: &[(u8, Vec<u32>)]) -> Fields {
        let mut fields = Fields {
            chains: ProvenanceLog::new("chains"),
            done: CompletionSet::new(),
        };
        for (source, items) in order {
            fields.chains.reduce(*source, items.clone()).unwrap();
            fields.done.reduce(*source, ()).unwrap();
        }
        fields
    }

    fn contributions() -> impl Strategy<Value = Vec<(u8, Vec<u32>)>> {
        proptest::collection::btree_map(any::<u8>(), proptest::collection::vec(any::<u32>(), 0..5), 1..8)
            .prop_map(|map| map.into_iter().collect())
    }

    proptest! {
        #[test]
        fn merge_order_does_not_change_result(
            (original, shuffled) in contributions().prop_flat_map(|c| {
                (Just(c.clone()), Just(c).prop_shuffle())
            })
        ) {
            prop_assert_eq!(merge_all(&original), merge_all(&shuffled));
        }

        #[test]
        fn grouping_of_merges_does_not_change_result(c in contributions(), split in 0usize..8) {
            let split = split.min(c.len());
            let (left, right) = c.split_at(split);

            let mut regrouped = right.to_vec();
            regrouped.extend_from_slice(left);
            prop_assert_eq!(merge_all(&c).chains.to_vec(), merge_all(&regrouped).chains.to_vec());
        }
    }

    #[test]
    fn reducers_report_parallelism() {
        let log: ProvenanceLog<u8, u32> = ProvenanceLog::new("x");
        let slot: OwnedSlot<u8, u32> = OwnedSlot::new("y", 1);
        let marker: LastWrite<u8> = LastWrite::new();

        assert_eq!(log.parallelism(), Parallelism::Full);
        assert_eq!(slot.parallelism(), Parallelism::Exclusive);
        assert_eq!(marker.parallelism(), Parallelism::None);
        assert_eq!(log.strategy(), "provenance_append");
    }
}
