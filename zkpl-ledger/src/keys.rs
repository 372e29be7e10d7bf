//! Key-type capability table for output ciphertexts.
//!
//! Ciphertexts declare which curve their ephemeral key lives on. Dispatch is
//! a capability lookup: secp256k1 is always installed, secp256r1 only when
//! the deployment enables it. A missing capability is a typed error, never a
//! silent pass-through.

use std::collections::HashMap;

use zkpl_common::{KeyType, OutputCiphertext};

use crate::error::LedgerError;

/// Validates that an ephemeral key is a real point on its declared curve.
trait EphemeralKeyValidator: Send + Sync {
    fn validate(&self, ephemeral_pubkey: &[u8]) -> bool;
}

struct Secp256k1Validator;

impl EphemeralKeyValidator for Secp256k1Validator {
    fn validate(&self, ephemeral_pubkey: &[u8]) -> bool {
        k256::PublicKey::from_sec1_bytes(ephemeral_pubkey).is_ok()
    }
}

struct Secp256r1Validator;

impl EphemeralKeyValidator for Secp256r1Validator {
    fn validate(&self, ephemeral_pubkey: &[u8]) -> bool {
        p256::PublicKey::from_sec1_bytes(ephemeral_pubkey).is_ok()
    }
}

/// Installed key-type capabilities.
pub struct KeyTypeRegistry {
    validators: HashMap<KeyType, Box<dyn EphemeralKeyValidator>>,
}

impl Default for KeyTypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl KeyTypeRegistry {
    /// The baseline registry: secp256k1 only.
    pub fn standard() -> Self {
        let mut validators: HashMap<KeyType, Box<dyn EphemeralKeyValidator>> = HashMap::new();
        validators.insert(KeyType::Secp256k1, Box::new(Secp256k1Validator));
        Self { validators }
    }

    /// Install the optional secp256r1 capability.
    pub fn enable_secp256r1(&mut self) {
        self.validators
            .insert(KeyType::Secp256r1, Box::new(Secp256r1Validator));
    }

    pub fn supports(&self, key_type: KeyType) -> bool {
        self.validators.contains_key(&key_type)
    }

    /// Check a ciphertext's key type and ephemeral key.
    pub fn validate(&self, ciphertext: &OutputCiphertext) -> Result<(), LedgerError> {
        let validator = self
            .validators
            .get(&ciphertext.key_type)
            .ok_or(LedgerError::KeyTypeUnavailable(ciphertext.key_type))?;
        if !validator.validate(&ciphertext.ephemeral_pubkey) {
            return Err(LedgerError::MalformedEphemeralKey(ciphertext.key_type));
        }
        Ok(())
    }
}
