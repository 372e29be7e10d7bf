//! Note commitments and nullifier derivation.
//!
//! These run off-core (wallets and provers compute them), but the derivation
//! must be bit-identical everywhere, so it lives in the shared crate with
//! pinned test vectors.

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::{Commitment, Nullifier};

const NOTE_COMMITMENT_DOMAIN: &[u8] = b"NOTE_COMMITMENT_v1";
const NULLIFIER_DOMAIN: &[u8] = b"NULLIFIER_v1";

/// One shielded UTXO note.
///
/// `blinding` hides the commitment: the same amount and owner with different
/// blinding produce unrelated commitments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub amount: u64,
    pub owner_pubkey: [u8; 32],
    pub blinding: [u8; 32],
}

impl Note {
    pub fn new(amount: u64, owner_pubkey: [u8; 32], blinding: [u8; 32]) -> Self {
        Self {
            amount,
            owner_pubkey,
            blinding,
        }
    }

    /// Commitment for this note; becomes a leaf in the global tree.
    pub fn commitment(&self) -> Commitment {
        commit(self)
    }
}

/// Compute the 32-byte commitment for a note.
///
/// Binds amount, owner, and blinding under a domain separator so commitments
/// cannot collide with nullifiers or other protocol hashes.
pub fn commit(note: &Note) -> Commitment {
    let mut hasher = Hasher::new();
    hasher.update(NOTE_COMMITMENT_DOMAIN);
    hasher.update(&note.amount.to_le_bytes());
    hasher.update(&note.owner_pubkey);
    hasher.update(&note.blinding);
    *hasher.finalize().as_bytes()
}

/// Derive a nullifier from a spend signature.
///
/// The signature is over the note commitment and deterministic (RFC 6979),
/// so the nullifier is stable per note while observers cannot link it back
/// to the owner.
pub fn compute_nullifier(signature: &[u8]) -> Nullifier {
    let mut hasher = Hasher::new();
    hasher.update(NULLIFIER_DOMAIN);
    hasher.update(signature);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullifier_is_deterministic() {
        let signature = [7u8; 65];
        assert_eq!(compute_nullifier(&signature), compute_nullifier(&signature));
    }

    #[test]
    fn different_signatures_give_different_nullifiers() {
        let sig1 = [7u8; 65];
        let mut sig2 = [7u8; 65];
        sig2[0] = 8;
        assert_ne!(compute_nullifier(&sig1), compute_nullifier(&sig2));
    }

    #[test]
    fn commitment_and_nullifier_domains_are_separated() {
        let note = Note::new(100, [1; 32], [2; 32]);
        assert_ne!(commit(&note), compute_nullifier(&[7u8; 65]));
    }

    /// Pinned vectors shared with the wallet implementations. Any change to
    /// the derivation breaks these and must be a versioned domain bump.
    #[test]
    fn commitment_vectors() {
        let vectors: Vec<(u64, [u8; 32], [u8; 32], &str)> = vec![
            (
                0,
                [0u8; 32],
                [0u8; 32],
                "1e8af20d48ee936d9103eababd56c1e38bf109efb7989b952c3fd8567a0acea0",
            ),
            (
                1,
                [0u8; 32],
                [0u8; 32],
                "48d08168fd95f6a20372352f24fff272d5fc196b83d301261e3256c426ca250d",
            ),
            (
                1_000_000,
                [0u8; 32],
                [0u8; 32],
                "0831eb81730f6f4d00d39710f63ee4369a7f30c5fedd5dc47b3dfeea6c14decd",
            ),
            (
                1,
                [1u8; 32],
                [1u8; 32],
                "ce6f22ebe3b967fe49cddfe0ee25f09720c315b839ede22b919735073cbce0c9",
            ),
            (
                u64::MAX,
                [0xff; 32],
                [0xff; 32],
                "9372b028a291b1de5689336039318b863f7d86f176c8dd3f18cac918267edb84",
            ),
        ];

        for (i, (amount, owner, blinding, expected)) in vectors.iter().enumerate() {
            let note = Note::new(*amount, *owner, *blinding);
            assert_eq!(
                hex::encode(commit(&note)),
                *expected,
                "commitment vector {} mismatch",
                i + 1
            );
        }
    }

    #[test]
    fn nullifier_vectors() {
        let vectors: Vec<([u8; 65], &str)> = vec![
            (
                [0u8; 65],
                "aaa2bc62243a9dcd2abf1711297594b30fd61f7a8fd6a04d8c87fbd7040520ae",
            ),
            (
                [7u8; 65],
                "db54b7046a9a8bf09b94c5bf269f81bb0a11dba770b7e20ff48e5918cf98c950",
            ),
            (
                [0xff; 65],
                "4a9e054aca596985fd24974695a7fca4fa971c2bac49dd6beb5d10795bc7a988",
            ),
        ];

        for (i, (sig, expected)) in vectors.iter().enumerate() {
            assert_eq!(
                hex::encode(compute_nullifier(sig)),
                *expected,
                "nullifier vector {} mismatch",
                i + 1
            );
        }
    }
}
