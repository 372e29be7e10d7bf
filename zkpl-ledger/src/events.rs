//! Change notifications emitted by successful ledger operations.
//!
//! Consumed by off-core indexers (and the HTTP backend's persistence layer).
//! Events are staged per call and published only if the whole call commits;
//! a rejected call emits nothing.

use serde::{Deserialize, Serialize};
use zkpl_common::{Commitment, KeyType};

/// Value entered the pool under a fresh commitment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositedEvent {
    pub from: String,
    pub amount: u64,
    pub commitment: Commitment,
    pub leaf_index: u64,
}

/// A commitment (with its encrypted note payload) landed in the tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputCommittedEvent {
    pub commitment: Commitment,
    pub key_type: KeyType,
    pub ephemeral_pubkey: Vec<u8>,
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
    pub leaf_index: u64,
}

/// The accumulator advanced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RootUpdatedEvent {
    pub old_root: [u8; 32],
    pub new_root: [u8; 32],
}

/// Value left the pool to a public recipient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawnEvent {
    pub to: String,
    pub amount: u64,
}

/// A metadata blob was attached to a commitment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataPostedEvent {
    pub commitment: Commitment,
    pub size: usize,
}

/// Union of all ledger notifications.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    Deposited(DepositedEvent),
    OutputCommitted(OutputCommittedEvent),
    RootUpdated(RootUpdatedEvent),
    Withdrawn(WithdrawnEvent),
    MetadataPosted(MetadataPostedEvent),
}
