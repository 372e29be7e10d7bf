//! Encrypted note payloads attached to output commitments.
//!
//! The ledger never decrypts these; it only checks that each ciphertext's
//! declared commitment matches the proved output commitment and that its key
//! type is supported, then republishes the blob for off-core recipients.

use serde::{Deserialize, Serialize};

use crate::Commitment;

/// Curve used for the recipient-encryption ephemeral key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// secp256k1, always supported.
    Secp256k1,
    /// NIST P-256, available only when the optional capability is configured.
    Secp256r1,
}

impl KeyType {
    /// Wire discriminant, matching the original contract enum.
    pub fn as_u8(self) -> u8 {
        match self {
            KeyType::Secp256k1 => 0,
            KeyType::Secp256r1 => 1,
        }
    }

    /// Parse a wire discriminant. Unknown values are a caller error.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KeyType::Secp256k1),
            1 => Some(KeyType::Secp256r1),
            _ => None,
        }
    }
}

/// An encrypted note destined for one recipient.
///
/// Opaque to the ledger except for `commitment`, which must equal the
/// corresponding proved output commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCiphertext {
    /// Commitment this ciphertext claims to describe.
    pub commitment: Commitment,
    /// Curve of the ephemeral key below.
    pub key_type: KeyType,
    /// SEC1-encoded ephemeral public key.
    pub ephemeral_pubkey: Vec<u8>,
    /// AEAD nonce.
    pub nonce: [u8; 12],
    /// Encrypted note payload.
    pub ciphertext: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_type_discriminants_round_trip() {
        assert_eq!(KeyType::from_u8(0), Some(KeyType::Secp256k1));
        assert_eq!(KeyType::from_u8(1), Some(KeyType::Secp256r1));
        assert_eq!(KeyType::Secp256k1.as_u8(), 0);
        assert_eq!(KeyType::Secp256r1.as_u8(), 1);
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        assert_eq!(KeyType::from_u8(2), None);
        assert_eq!(KeyType::from_u8(255), None);
    }
}
