//! The incremental tree itself, plus membership proofs for external provers.

use serde::{Deserialize, Serialize};
use zkpl_common::{hash_pair, Commitment};

use crate::zeros::{empty_root, ZERO_HASHES};
use crate::TREE_HEIGHT;

/// Membership proof for a fixed-height tree: the leaf position and one
/// sibling hash per level, leaf to root.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: u64,
    pub siblings: Vec<[u8; 32]>,
}

/// Append-only incremental Merkle tree of height [`TREE_HEIGHT`].
///
/// `filled_subtrees[level]` holds the most recent left-child hash at that
/// level, which is exactly the sibling a future right-side insert needs.
/// Insertion and root maintenance are O(height); the full leaf log is kept
/// so membership proofs can be reconstructed for provers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncrementalTree {
    leaves: Vec<Commitment>,
    filled_subtrees: Vec<[u8; 32]>,
    root: [u8; 32],
    next_index: u64,
}

impl Default for IncrementalTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalTree {
    /// An empty tree. Its root is the top-level zero hash.
    pub fn new() -> Self {
        Self {
            leaves: Vec::new(),
            filled_subtrees: ZERO_HASHES.to_vec(),
            root: empty_root(),
            next_index: 0,
        }
    }

    /// Append a leaf, returning the new root and the index it landed at.
    pub fn insert(&mut self, leaf: Commitment) -> ([u8; 32], u64) {
        let index = self.next_index;
        self.leaves.push(leaf);

        let mut current = leaf;
        let mut idx = index;
        for level in 0..TREE_HEIGHT {
            if idx % 2 == 0 {
                // Left child: remember it for the future right sibling, then
                // pair with the empty subtree on the right.
                self.filled_subtrees[level] = current;
                current = hash_pair(&current, &ZERO_HASHES[level]);
            } else {
                current = hash_pair(&self.filled_subtrees[level], &current);
            }
            idx /= 2;
        }

        self.root = current;
        self.next_index += 1;
        (self.root, index)
    }

    /// Current root.
    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    /// Index the next inserted leaf will receive.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaf(&self, index: usize) -> Option<Commitment> {
        self.leaves.get(index).copied()
    }

    pub fn leaves(&self) -> &[Commitment] {
        &self.leaves
    }

    /// Reconstruct a membership proof for the leaf at `leaf_index`.
    ///
    /// Replays the per-level sibling rule over the recorded leaf sequence;
    /// siblings beyond the populated frontier are the level's zero hash.
    pub fn prove(&self, leaf_index: usize) -> Option<MerkleProof> {
        if leaf_index >= self.leaves.len() {
            return None;
        }

        let mut siblings = Vec::with_capacity(TREE_HEIGHT);
        let mut level_nodes = self.leaves.clone();
        let mut index = leaf_index;

        for level in 0..TREE_HEIGHT {
            let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
            siblings.push(
                level_nodes
                    .get(sibling_index)
                    .copied()
                    .unwrap_or(ZERO_HASHES[level]),
            );

            if level_nodes.len() <= 1 {
                // Everything above is zero-padded; finish from the table.
                break;
            }

            let mut next_level = Vec::with_capacity((level_nodes.len() + 1) / 2);
            for pair in level_nodes.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(ZERO_HASHES[level]);
                next_level.push(hash_pair(&left, &right));
            }
            level_nodes = next_level;
            index /= 2;
        }

        while siblings.len() < TREE_HEIGHT {
            siblings.push(ZERO_HASHES[siblings.len()]);
        }

        Some(MerkleProof {
            leaf_index: leaf_index as u64,
            siblings,
        })
    }

    /// Verify a membership proof against a root. Stateless; used by provers
    /// inside the proving circuit as well as in tests here.
    pub fn verify_proof(leaf: Commitment, proof: &MerkleProof, expected_root: [u8; 32]) -> bool {
        if proof.siblings.len() != TREE_HEIGHT {
            return false;
        }

        let mut current = leaf;
        let mut index = proof.leaf_index;
        for sibling in &proof.siblings {
            current = if index % 2 == 0 {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
            index /= 2;
        }
        current == expected_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference root: fully materialize the bottom levels, then fold zero
    /// hashes the rest of the way up.
    fn reference_root(leaves: &[Commitment]) -> [u8; 32] {
        if leaves.is_empty() {
            return empty_root();
        }
        let mut level_nodes: Vec<[u8; 32]> = leaves.to_vec();
        for level in 0..TREE_HEIGHT {
            if level_nodes.len() == 1 {
                let mut current = level_nodes[0];
                for upper in level..TREE_HEIGHT {
                    current = hash_pair(&current, &ZERO_HASHES[upper]);
                }
                return current;
            }
            let mut next_level = Vec::with_capacity((level_nodes.len() + 1) / 2);
            for pair in level_nodes.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(ZERO_HASHES[level]);
                next_level.push(hash_pair(&left, &right));
            }
            level_nodes = next_level;
        }
        level_nodes[0]
    }

    fn leaf(tag: u8) -> Commitment {
        [tag; 32]
    }

    #[test]
    fn empty_tree_root_is_top_zero() {
        let tree = IncrementalTree::new();
        assert_eq!(tree.root(), empty_root());
        assert_eq!(tree.next_index(), 0);
    }

    #[test]
    fn single_leaf_root_is_zero_fold() {
        let mut tree = IncrementalTree::new();
        let (root, index) = tree.insert(leaf(1));
        assert_eq!(index, 0);

        let mut expected = leaf(1);
        for level in 0..TREE_HEIGHT {
            expected = hash_pair(&expected, &ZERO_HASHES[level]);
        }
        assert_eq!(root, expected);
    }

    #[test]
    fn two_leaf_root_folds_their_pair() {
        let mut tree = IncrementalTree::new();
        tree.insert(leaf(1));
        let (root, _) = tree.insert(leaf(2));

        let mut expected = hash_pair(&leaf(1), &leaf(2));
        for level in 1..TREE_HEIGHT {
            expected = hash_pair(&expected, &ZERO_HASHES[level]);
        }
        assert_eq!(root, expected);
    }

    #[test]
    fn incremental_root_matches_reference_for_twenty_leaves() {
        let mut tree = IncrementalTree::new();
        let mut leaves = Vec::new();
        for tag in 1..=20u8 {
            leaves.push(leaf(tag));
            tree.insert(leaf(tag));
            assert_eq!(
                tree.root(),
                reference_root(&leaves),
                "root diverged after {} leaves",
                leaves.len()
            );
        }
    }

    #[test]
    fn indices_are_sequential() {
        let mut tree = IncrementalTree::new();
        for expected in 0..5u64 {
            let (_, index) = tree.insert(leaf(expected as u8 + 1));
            assert_eq!(index, expected);
        }
        assert_eq!(tree.leaf_count(), 5);
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        let mut tree = IncrementalTree::new();
        let leaves: Vec<Commitment> = (1..=4u8).map(leaf).collect();
        for l in &leaves {
            tree.insert(*l);
        }

        let root = tree.root();
        for (i, l) in leaves.iter().enumerate() {
            let proof = tree.prove(i).expect("proof for populated leaf");
            assert_eq!(proof.siblings.len(), TREE_HEIGHT);
            assert!(IncrementalTree::verify_proof(*l, &proof, root));
        }
    }

    #[test]
    fn wrong_leaf_fails_verification() {
        let mut tree = IncrementalTree::new();
        tree.insert(leaf(1));
        tree.insert(leaf(2));

        let root = tree.root();
        let proof = tree.prove(0).unwrap();
        assert!(!IncrementalTree::verify_proof(leaf(99), &proof, root));
    }

    #[test]
    fn corrupted_sibling_fails_verification() {
        let mut tree = IncrementalTree::new();
        tree.insert(leaf(1));
        tree.insert(leaf(2));

        let root = tree.root();
        let mut proof = tree.prove(0).unwrap();
        assert!(IncrementalTree::verify_proof(leaf(1), &proof, root));

        proof.siblings[0][0] ^= 0x01;
        assert!(!IncrementalTree::verify_proof(leaf(1), &proof, root));
    }

    #[test]
    fn wrong_index_fails_verification() {
        let mut tree = IncrementalTree::new();
        tree.insert(leaf(1));
        tree.insert(leaf(2));

        let root = tree.root();
        let mut proof = tree.prove(0).unwrap();
        proof.leaf_index = 1;
        assert!(!IncrementalTree::verify_proof(leaf(1), &proof, root));
    }

    #[test]
    fn prove_out_of_bounds_is_none() {
        let tree = IncrementalTree::new();
        assert!(tree.prove(0).is_none());
        assert!(tree.prove(100).is_none());
    }
}
