//! Deterministic fixtures for ledger and backend tests.
//!
//! Everything here is reproducible from constants: commitments and
//! nullifiers are tagged blake3 digests, ephemeral keys are derived from
//! fixed scalars, and proofs are the digest-binding kind the development
//! verifier accepts. No randomness, no I/O.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use zkpl_common::{Commitment, KeyType, Nullifier, OutputCiphertext, PublicOutputs};

/// Verification key installed in test ledgers.
pub fn test_verification_key() -> Vec<u8> {
    b"zkpl-fixture-vkey-001".to_vec()
}

/// The proof bytes the development digest-binding verifier accepts for
/// `(verification_key, public_values)`.
pub fn binding_proof(verification_key: &[u8], public_values: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(verification_key);
    hasher.update(public_values);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A distinct, reproducible commitment per tag.
pub fn commitment(tag: u64) -> Commitment {
    *blake3::Hasher::new()
        .update(b"fixture-commitment")
        .update(&tag.to_le_bytes())
        .finalize()
        .as_bytes()
}

/// A distinct, reproducible nullifier per tag.
pub fn nullifier(tag: u64) -> Nullifier {
    *blake3::Hasher::new()
        .update(b"fixture-nullifier")
        .update(&tag.to_le_bytes())
        .finalize()
        .as_bytes()
}

/// SEC1-compressed secp256k1 point derived from a fixed nonzero scalar.
pub fn k1_ephemeral_key() -> Vec<u8> {
    let secret = k256::SecretKey::from_slice(&[0x42u8; 32]).unwrap();
    secret
        .public_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec()
}

/// SEC1-compressed P-256 point derived from a fixed nonzero scalar.
pub fn r1_ephemeral_key() -> Vec<u8> {
    let secret = p256::SecretKey::from_slice(&[0x42u8; 32]).unwrap();
    secret
        .public_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec()
}

/// A well-formed secp256k1 ciphertext wrapping `commitment`.
pub fn k1_ciphertext(commitment: Commitment) -> OutputCiphertext {
    OutputCiphertext {
        commitment,
        key_type: KeyType::Secp256k1,
        ephemeral_pubkey: k1_ephemeral_key(),
        nonce: [7u8; 12],
        ciphertext: vec![0xc0, 0xff, 0xee],
    }
}

/// A well-formed P-256 ciphertext wrapping `commitment`.
pub fn r1_ciphertext(commitment: Commitment) -> OutputCiphertext {
    OutputCiphertext {
        commitment,
        key_type: KeyType::Secp256r1,
        ephemeral_pubkey: r1_ephemeral_key(),
        nonce: [7u8; 12],
        ciphertext: vec![0xc0, 0xff, 0xee],
    }
}

/// A fully assembled transfer: ABI-encoded public values, a matching
/// digest-binding proof, and ciphertexts aligned 1:1 with the output
/// commitments.
pub struct TransferBundle {
    pub public_values: Vec<u8>,
    pub proof: [u8; 32],
    pub ciphertexts: Vec<OutputCiphertext>,
}

/// Build a transfer bundle against `old_root` under the fixture vkey.
pub fn transfer_bundle(
    old_root: [u8; 32],
    nullifiers: Vec<Nullifier>,
    output_commitments: Vec<Commitment>,
) -> TransferBundle {
    let outputs = PublicOutputs {
        old_root,
        nullifiers,
        output_commitments: output_commitments.clone(),
    };
    let public_values = outputs.abi_encode();
    let proof = binding_proof(&test_verification_key(), &public_values);
    let ciphertexts = output_commitments.into_iter().map(k1_ciphertext).collect();
    TransferBundle {
        public_values,
        proof,
        ciphertexts,
    }
}
