//! Shared types and hashing for the zkpl shielded ledger.
//!
//! Everything that both the ledger core and external collaborators (provers,
//! indexers, the HTTP backend) need to agree on lives here: the 32-byte hash
//! aliases, the Keccak256 node hash used by the commitment tree, the
//! ABI-bound `PublicOutputs` payload, and the note commitment / nullifier
//! derivation used by off-core wallets.

use sha3::{Digest, Keccak256};

pub mod ciphertext;
pub mod note;
pub mod outputs;

pub use ciphertext::{KeyType, OutputCiphertext};
pub use note::{commit, compute_nullifier, Note};
pub use outputs::PublicOutputs;

/// A 32-byte hash committing to one unspent output. Opaque to the ledger
/// core; its preimage (amount, owner, blinding) is only known off-core.
pub type Commitment = [u8; 32];

/// A 32-byte spend marker. Posted publicly when a note is spent and tracked
/// forever to prevent double-spends; unlinkable to its commitment.
pub type Nullifier = [u8; 32];

/// The all-zero hash, used as the empty leaf and as a reserved sentinel that
/// is never a valid deposit commitment.
pub const ZERO_HASH: [u8; 32] = [0u8; 32];

/// Hash two 32-byte values with Keccak256.
///
/// Matches Solidity's `keccak256(abi.encodePacked(left, right))` so roots
/// computed here agree with EVM-side verifiers.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Render a 32-byte hash as a `0x`-prefixed hex string.
pub fn hex32(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a 32-byte hash from a hex string, with or without a `0x` prefix.
pub fn parse_hex32(s: &str) -> anyhow::Result<[u8; 32]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    anyhow::ensure!(s.len() == 64, "expected 64 hex chars, got {}", s.len());
    let bytes = hex::decode(s)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
