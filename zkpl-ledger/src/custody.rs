//! Asset custody boundary.
//!
//! The ledger counts value; something else holds it. This module defines the
//! capability the ledger calls to move custodied assets in and out of the
//! pool, the delegated-approval payload for gasless-style deposits, and an
//! in-memory implementation used by the backend and tests.

use std::collections::{HashMap, HashSet};

use blake3::Hasher;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APPROVAL_DOMAIN: &[u8] = b"ZKPL_APPROVAL_v1";

/// Custody-side failure. The ledger surfaces these as `AssetTransferFailed`.
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("account {account} holds {available}, needs {requested}")]
    InsufficientFunds {
        account: String,
        available: u64,
        requested: u64,
    },

    #[error("pool holds {available}, needs {requested}")]
    PoolUnderflow { available: u64, requested: u64 },

    #[error("approval signature invalid: {0}")]
    BadApprovalSignature(String),

    #[error("approval nonce {0} already used")]
    NonceReplayed(u64),
}

/// A signed, single-use permission to pull funds from a depositor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Approval {
    /// Asset the approval covers; must match the pool's configured asset.
    pub token: String,
    /// Maximum amount the approval authorizes.
    pub amount: u64,
    /// Single-use nonce, tracked per depositor.
    pub nonce: u64,
}

impl Approval {
    /// Digest the depositor signs (blake3, domain separated).
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut hasher = Hasher::new();
        hasher.update(APPROVAL_DOMAIN);
        hasher.update(self.token.as_bytes());
        hasher.update(&self.amount.to_le_bytes());
        hasher.update(&self.nonce.to_le_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// Verify a depositor's secp256k1 signature over an approval.
///
/// `depositor` is the hex-encoded SEC1 public key that doubles as the
/// account identifier.
pub fn verify_approval_signature(
    approval: &Approval,
    signature: &[u8],
    depositor: &str,
) -> Result<(), CustodyError> {
    let key_bytes = hex::decode(depositor.strip_prefix("0x").unwrap_or(depositor))
        .map_err(|e| CustodyError::BadApprovalSignature(format!("depositor key: {e}")))?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&key_bytes)
        .map_err(|e| CustodyError::BadApprovalSignature(format!("depositor key: {e}")))?;
    let signature = Signature::from_slice(signature)
        .map_err(|e| CustodyError::BadApprovalSignature(format!("signature: {e}")))?;
    verifying_key
        .verify_prehash(&approval.signing_digest(), &signature)
        .map_err(|e| CustodyError::BadApprovalSignature(e.to_string()))
}

/// Moves custodied value between external accounts and the pool.
pub trait AssetCustody: Send + Sync {
    /// The single asset this pool custodies.
    fn asset_id(&self) -> &str;

    /// Pull `amount` from `from` into the pool.
    fn transfer_in(&mut self, from: &str, amount: u64) -> Result<(), CustodyError>;

    /// Pull `amount` from `depositor` using a signed approval instead of a
    /// direct call by the account holder.
    fn transfer_in_with_approval(
        &mut self,
        approval: &Approval,
        signature: &[u8],
        depositor: &str,
        amount: u64,
    ) -> Result<(), CustodyError>;

    /// Release `amount` from the pool to `to`.
    fn transfer_out(&mut self, to: &str, amount: u64) -> Result<(), CustodyError>;

    /// Value currently custodied by the pool.
    fn pool_balance(&self) -> u64;
}

/// In-memory custody: a balance table and a pool counter.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCustody {
    asset: String,
    accounts: HashMap<String, u64>,
    pool: u64,
    used_nonces: HashSet<(String, u64)>,
}

impl InMemoryCustody {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            ..Self::default()
        }
    }

    /// Seed an external account balance (test/devnet faucet).
    pub fn with_account(mut self, account: impl Into<String>, balance: u64) -> Self {
        self.accounts.insert(account.into(), balance);
        self
    }

    /// Restore the pool counter when replaying persisted state.
    pub fn with_pool_balance(mut self, balance: u64) -> Self {
        self.pool = balance;
        self
    }

    pub fn account_balance(&self, account: &str) -> u64 {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    fn debit(&mut self, account: &str, amount: u64) -> Result<(), CustodyError> {
        let balance = self.accounts.entry(account.to_string()).or_insert(0);
        if *balance < amount {
            return Err(CustodyError::InsufficientFunds {
                account: account.to_string(),
                available: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }
}

impl AssetCustody for InMemoryCustody {
    fn asset_id(&self) -> &str {
        &self.asset
    }

    fn transfer_in(&mut self, from: &str, amount: u64) -> Result<(), CustodyError> {
        self.debit(from, amount)?;
        self.pool += amount;
        Ok(())
    }

    fn transfer_in_with_approval(
        &mut self,
        approval: &Approval,
        signature: &[u8],
        depositor: &str,
        amount: u64,
    ) -> Result<(), CustodyError> {
        verify_approval_signature(approval, signature, depositor)?;
        let nonce_key = (depositor.to_string(), approval.nonce);
        if self.used_nonces.contains(&nonce_key) {
            return Err(CustodyError::NonceReplayed(approval.nonce));
        }
        self.debit(depositor, amount)?;
        self.used_nonces.insert(nonce_key);
        self.pool += amount;
        Ok(())
    }

    fn transfer_out(&mut self, to: &str, amount: u64) -> Result<(), CustodyError> {
        if self.pool < amount {
            return Err(CustodyError::PoolUnderflow {
                available: self.pool,
                requested: amount,
            });
        }
        self.pool -= amount;
        *self.accounts.entry(to.to_string()).or_insert(0) += amount;
        Ok(())
    }

    fn pool_balance(&self) -> u64 {
        self.pool
    }
}
