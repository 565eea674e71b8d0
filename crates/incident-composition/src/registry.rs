//! Field ownership registry
//!
//! Provides [`OwnershipRegistry`]: the static map from each shared-state
//! field to the one source allowed to write it. The merge step consults it
//! before any reducer runs, so a stage proposing an update to a field it does
//! not own is rejected without touching state.

use crate::strategy::CompositionError;
use std::collections::BTreeMap;
use std::fmt;

/// Map of field name to owning source
#[derive(Debug, Clone)]
pub struct OwnershipRegistry<K> {
    owners: BTreeMap<&'static str, K>,
}

impl<K> Default for OwnershipRegistry<K> {
    fn default() -> Self {
        Self {
            owners: BTreeMap::new(),
        }
    }
}

impl<K> OwnershipRegistry<K>
where
    K: Copy + PartialEq + fmt::Display,
{
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner` as the sole writer of `field`
    ///
    /// Re-claiming a field for the same owner is a no-op.
    pub fn claim(&mut self, field: &'static str, owner: K) -> Result<(), CompositionError> {
        match self.owners.get(field) {
            Some(existing) if *existing != owner => Err(CompositionError::AlreadyClaimed {
                field: field.to_string(),
                owner: existing.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(field, owner);
                Ok(())
            }
        }
    }

    /// Owner of `field`
    #[inline]
    #[must_use]
    pub fn owner_of(&self, field: &str) -> Option<K> {
        self.owners.get(field).copied()
    }

    /// Check that `writer` may write `field`
    pub fn authorize(&self, field: &str, writer: K) -> Result<(), CompositionError> {
        match self.owners.get(field) {
            None => Err(CompositionError::UnknownField(field.to_string())),
            Some(owner) if *owner == writer => Ok(()),
            Some(owner) => Err(CompositionError::ownership_conflict(field, owner, writer)),
        }
    }

    /// Fields owned by `owner`, in name order
    #[must_use]
    pub fn fields_of(&self, owner: K) -> Vec<&'static str> {
        self.owners
            .iter()
            .filter(|(_, o)| **o == owner)
            .map(|(field, _)| *field)
            .collect()
    }

    /// Iterate over `(field, owner)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, K)> + '_ {
        self.owners.iter().map(|(field, owner)| (*field, *owner))
    }

    /// Get number of registered fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
