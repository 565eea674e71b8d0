//! Reducer trait and core types
//!
//! Provides the [`Reducer`] trait: one merge function per shared-state field,
//! applied by the scheduler's serialized merge step.

use std::fmt;

/// Per-field merge function
///
/// A reducer folds one contribution, tagged with the identity of the stage
/// that produced it, into the accumulated field value.
///
/// # Contract
/// On `Err` the accumulated value is left untouched.
pub trait Reducer<K> {
    /// What a single stage contributes
    type Input;

    /// Fold `input` produced by `source` into the field
    fn reduce(&mut self, source: K, input: Self::Input) -> Result<(), CompositionError>;

    /// Whether contributions may arrive in any order
    fn parallelism(&self) -> Parallelism;

    /// Strategy name (for diagnostics)
    fn strategy(&self) -> &'static str;
}

/// Ordering sensitivity of a reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// Commutative and associative: any merge order yields the same value
    Full,

    /// Order-independent because at most one source may ever write
    Exclusive,

    /// Order-dependent; only usable for values nothing else reads
    None,
}

impl Parallelism {
    /// Check if contributions from concurrent stages may be merged in any order
    #[inline]
    #[must_use]
    pub fn allows_parallel(&self) -> bool {
        matches!(self, Self::Full | Self::Exclusive)
    }
}

impl fmt::Display for Parallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Exclusive => write!(f, "exclusive"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Merge rejection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    /// A source wrote to a field owned by another source
    #[error("field `{field}` is owned by `{owner}`, rejected write from `{writer}`")]
    OwnershipConflict {
        /// Field name
        field: String,
        /// Declared owner
        owner: String,
        /// Source that attempted the write
        writer: String,
    },

    /// A source contributed to the same field twice
    #[error("`{source_id}` already contributed to `{field}`")]
    DuplicateContribution {
        /// Field name
        field: String,
        /// Repeated source
        source_id: String,
    },

    /// No owner is registered for the field
    #[error("no owner registered for field `{0}`")]
    UnknownField(String),

    /// A field was claimed by two different owners
    #[error("field `{field}` already claimed by `{owner}`")]
    AlreadyClaimed {
        /// Field name
        field: String,
        /// Existing owner
        owner: String,
    },
}

impl CompositionError {
    /// Create an ownership conflict
    #[inline]
    #[must_use]
    pub fn ownership_conflict(
        field: impl Into<String>,
        owner: impl fmt::Display,
        writer: impl fmt::Display,
    ) -> Self {
        Self::OwnershipConflict {
            field: field.into(),
            owner: owner.to_string(),
            writer: writer.to_string(),
        }
    }

    /// Create a duplicate contribution error
    #[inline]
    #[must_use]
    pub fn duplicate(field: impl Into<String>, source: impl fmt::Display) -> Self {
        Self::DuplicateContribution {
            field: field.into(),
            source_id: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallelism_allows_parallel() {
        assert!(Parallelism::Full.allows_parallel());
        assert!(Parallelism::Exclusive.allows_parallel());
        assert!(!Parallelism::None.allows_parallel());
    }

    #[test]
    fn ownership_conflict_message() {
        let err = CompositionError::ownership_conflict("risk_predictions", "predictive_risk", "ticket");
        assert_eq!(
            err.to_string(),
            "field `risk_predictions` is owned by `predictive_risk`, rejected write from `ticket`"
        );
    }

    #[test]
    fn duplicate_message() {
        let err = CompositionError::duplicate("causal_chains", "root_cause");
        assert!(matches!(err, CompositionError::DuplicateContribution { .. }));
        assert!(err.to_string().contains("root_cause"));
    }
}
