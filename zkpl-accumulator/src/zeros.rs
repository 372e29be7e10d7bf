//! Precomputed empty-subtree hashes.

use once_cell::sync::Lazy;
use zkpl_common::hash_pair;

use crate::TREE_HEIGHT;

/// `ZERO_HASHES[0]` is the empty leaf (all zero bytes);
/// `ZERO_HASHES[i] = Keccak256(ZERO_HASHES[i-1] ‖ ZERO_HASHES[i-1])`.
pub static ZERO_HASHES: Lazy<[[u8; 32]; TREE_HEIGHT]> = Lazy::new(|| {
    let mut zeros = [[0u8; 32]; TREE_HEIGHT];
    for i in 1..TREE_HEIGHT {
        zeros[i] = hash_pair(&zeros[i - 1], &zeros[i - 1]);
    }
    zeros
});

/// Root of a tree with no leaves: the empty subtree spanning all levels.
pub fn empty_root() -> [u8; 32] {
    ZERO_HASHES[TREE_HEIGHT - 1]
}
