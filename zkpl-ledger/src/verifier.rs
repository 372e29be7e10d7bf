//! The proof-verification capability boundary.
//!
//! The ledger never constructs or inspects proofs; it only asks an injected
//! verifier whether `(publicValues, proof)` is valid under a verification
//! key. Production deployments install an adapter over a real proof system;
//! tests and devnets use deterministic stand-ins.

use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Why a verifier rejected a proof.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("proof rejected: {0}")]
    Rejected(String),

    #[error("malformed proof: {0}")]
    Malformed(String),
}

/// Capability that cryptographically binds public values to a proof.
///
/// A successful return guarantees the proof commits to exactly the supplied
/// `public_values` buffer, which is why the ledger may decode its transition
/// intent from that buffer and nothing else.
pub trait ProofVerifier: Send + Sync {
    fn verify(
        &self,
        verification_key: &[u8],
        public_values: &[u8],
        proof: &[u8],
    ) -> Result<(), VerifierError>;
}

/// Development-only verifier: accepts a proof iff it equals
/// `Keccak256(verification_key ‖ public_values)`.
///
/// This reproduces the binding property (the proof commits to the exact
/// public-values buffer) with no soundness whatsoever; it exists so the
/// admission protocol can be exercised end to end without a proving stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestBindingVerifier;

impl DigestBindingVerifier {
    /// The proof bytes this verifier accepts for a given key and payload.
    /// Exposed so fixtures and devnet provers can mint matching proofs.
    pub fn expected_proof(verification_key: &[u8], public_values: &[u8]) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(verification_key);
        hasher.update(public_values);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

impl ProofVerifier for DigestBindingVerifier {
    fn verify(
        &self,
        verification_key: &[u8],
        public_values: &[u8],
        proof: &[u8],
    ) -> Result<(), VerifierError> {
        if proof.len() != 32 {
            return Err(VerifierError::Malformed(format!(
                "expected 32 proof bytes, got {}",
                proof.len()
            )));
        }
        let expected = Self::expected_proof(verification_key, public_values);
        if proof != expected {
            return Err(VerifierError::Rejected(
                "digest does not match public values".into(),
            ));
        }
        Ok(())
    }
}
