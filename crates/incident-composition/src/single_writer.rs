//! Single writer reducer
//!
//! A scalar field with exactly one declared owner. Concurrent siblings can
//! never race on it because only the owner's contribution is accepted.

use crate::strategy::{CompositionError, Parallelism, Reducer};
use serde::{Serialize, Serializer};
use std::fmt;

/// Scalar slot written once by its declared owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedSlot<K, T> {
    field: &'static str,
    owner: K,
    value: Option<T>,
}

impl<K, T> OwnedSlot<K, T> {
    /// Create an empty slot for `field`, writable only by `owner`
    #[inline]
    #[must_use]
    pub fn new(field: &'static str, owner: K) -> Self {
        Self {
            field,
            owner,
            value: None,
        }
    }

    /// Field name
    #[inline]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Declared owner
    #[inline]
    pub fn owner(&self) -> &K {
        &self.owner
    }

    /// Current value, if the owner has written
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Whether the owner has written
    #[inline]
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

impl<K, T> Reducer<K> for OwnedSlot<K, T>
where
    K: PartialEq + fmt::Display,
{
    type Input = T;

    fn reduce(&mut self, source: K, input: T) -> Result<(), CompositionError> {
        if source != self.owner {
            return Err(CompositionError::ownership_conflict(
                self.field,
                &self.owner,
                &source,
            ));
        }
        if self.value.is_some() {
            return Err(CompositionError::duplicate(self.field, source));
        }
        self.value = Some(input);
        Ok(())
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Exclusive
    }

    fn strategy(&self) -> &'static str {
        "single_writer"
    }
}

/// Serialized as the bare value (`null` until written)
impl<K, T: Serialize> Serialize for OwnedSlot<K, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}
