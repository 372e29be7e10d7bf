//! Append-only incremental Merkle accumulator.
//!
//! A fixed-height binary Keccak256 tree in which every unfilled leaf is the
//! zero hash. Inserting leaf `i` touches O(height) nodes by tracking, per
//! level, the left sibling that the next right-insert will need. The root
//! after each insert equals the root a fully materialized `2^H`-leaf tree
//! would have, without ever materializing it.

mod tree;
mod zeros;

pub use tree::{IncrementalTree, MerkleProof};
pub use zeros::{empty_root, ZERO_HASHES};

/// Tree height. 32 levels support up to 2^32 leaves.
pub const TREE_HEIGHT: usize = 32;
