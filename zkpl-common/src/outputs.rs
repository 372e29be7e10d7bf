//! The proved state-transition payload and its ABI encoding.
//!
//! A prover commits these values inside the proof itself; the ledger decodes
//! them back out of the *verified* buffer and never from a side channel.
//! The wire layout is the Solidity tuple
//! `{ bytes32 oldRoot; bytes32[] nullifiers; bytes32[] outputCommitments; }`
//! so that EVM verifiers and this ledger decode the exact same bytes.

use alloy_sol_types::{sol, SolValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{Commitment, Nullifier};

sol! {
    struct PublicOutputsSol {
        bytes32 oldRoot;
        bytes32[] nullifiers;
        bytes32[] outputCommitments;
    }
}

/// The only state-transition intent the ledger trusts.
///
/// `old_root` anchors the snapshot the proof was computed against and is used
/// solely for root-history admission; the post-insertion accumulator root is
/// authoritative and never caller-supplied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicOutputs {
    /// Accumulator root the proof was generated against.
    pub old_root: [u8; 32],
    /// Spend markers consumed by this transition, in order.
    pub nullifiers: Vec<Nullifier>,
    /// Commitments created by this transition, in order.
    pub output_commitments: Vec<Commitment>,
}

impl PublicOutputs {
    /// ABI-encode for embedding in a proof's public values.
    pub fn abi_encode(&self) -> Vec<u8> {
        let sol = PublicOutputsSol {
            oldRoot: self.old_root.into(),
            nullifiers: self.nullifiers.iter().map(|n| (*n).into()).collect(),
            outputCommitments: self
                .output_commitments
                .iter()
                .map(|c| (*c).into())
                .collect(),
        };
        sol.abi_encode()
    }

    /// Decode from a verified public-values buffer.
    pub fn abi_decode(bytes: &[u8]) -> Result<Self> {
        let sol = PublicOutputsSol::abi_decode(bytes, true)
            .context("public values are not a valid PublicOutputs encoding")?;
        Ok(Self {
            old_root: sol.oldRoot.0,
            nullifiers: sol.nullifiers.into_iter().map(|n| n.0).collect(),
            output_commitments: sol.outputCommitments.into_iter().map(|c| c.0).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PublicOutputs {
        PublicOutputs {
            old_root: [0xaa; 32],
            nullifiers: vec![[0x01; 32], [0x02; 32]],
            output_commitments: vec![[0x03; 32]],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let outputs = sample();
        let encoded = outputs.abi_encode();
        let decoded = PublicOutputs::abi_decode(&encoded).unwrap();
        assert_eq!(decoded, outputs);
    }

    #[test]
    fn empty_vectors_are_representable() {
        let outputs = PublicOutputs {
            old_root: [0; 32],
            nullifiers: vec![],
            output_commitments: vec![],
        };
        let decoded = PublicOutputs::abi_decode(&outputs.abi_encode()).unwrap();
        assert!(decoded.nullifiers.is_empty());
        assert!(decoded.output_commitments.is_empty());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut encoded = sample().abi_encode();
        encoded.truncate(encoded.len() / 2);
        assert!(PublicOutputs::abi_decode(&encoded).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(PublicOutputs::abi_decode(&[0x42; 17]).is_err());
    }
}
