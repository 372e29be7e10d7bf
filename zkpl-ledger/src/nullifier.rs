//! Nullifier set: the sole double-spend guard.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use zkpl_common::Nullifier;

use crate::error::LedgerError;

/// One-way set of spent-note markers. Insertion never reverses; inserting a
/// present nullifier fails the enclosing transaction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NullifierSet {
    used: HashSet<Nullifier>,
}

impl NullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check-and-mark one nullifier.
    ///
    /// Applied per nullifier, immediately, never batched: a duplicate within
    /// a single transaction's list fails on its second occurrence with no
    /// special-case dedup logic.
    pub fn consume(&mut self, nullifier: Nullifier) -> Result<(), LedgerError> {
        if !self.used.insert(nullifier) {
            return Err(LedgerError::NullifierAlreadyUsed(nullifier));
        }
        Ok(())
    }

    pub fn is_used(&self, nullifier: &Nullifier) -> bool {
        self.used.contains(nullifier)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Iterate all consumed nullifiers (order unspecified).
    pub fn iter(&self) -> impl Iterator<Item = &Nullifier> {
        self.used.iter()
    }
}
