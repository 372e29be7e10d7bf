//! Root history: the historical-root admission set.
//!
//! Proofs are generated offline and take time; by submission the accumulator
//! may have advanced past the root the proof anchored to. Admitting only the
//! latest root would make concurrent proving a race, so every root the
//! accumulator has ever held stays admissible forever. Double-spend safety
//! is enforced solely by the nullifier set, not by root freshness.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Monotonically growing set of every accumulator root ever produced.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RootHistory {
    roots: HashSet<[u8; 32]>,
}

impl RootHistory {
    /// History seeded with the genesis (empty-tree) root, which stays a
    /// permanent member.
    pub fn new(genesis_root: [u8; 32]) -> Self {
        let mut roots = HashSet::new();
        roots.insert(genesis_root);
        Self { roots }
    }

    /// Record a root. Roots are never removed.
    pub fn insert(&mut self, root: [u8; 32]) {
        self.roots.insert(root);
    }

    /// Whether `root` was ever held by the accumulator.
    pub fn contains(&self, root: &[u8; 32]) -> bool {
        self.roots.contains(root)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
