//! Error taxonomy for ledger operations.
//!
//! Every variant is fatal to its call: the ledger rolls back all staged
//! mutations and the caller must resubmit a corrected transaction. Nothing
//! here is retried internally.

use thiserror::Error;
use zkpl_common::KeyType;

/// Typed failure reason for a rejected ledger call.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The proof verifier rejected `(publicValues, proof)`.
    #[error("proof verification failed: {0}")]
    ProofInvalid(String),

    /// No proof-verification capability is installed.
    #[error("no proof verifier configured")]
    VerifierUnconfigured,

    /// The verified payload does not decode as `PublicOutputs`.
    #[error("public values malformed: {0}")]
    PublicValuesMalformed(String),

    /// The proof's anchor root was never held by the accumulator.
    #[error("old root 0x{} is not in the root history", hex::encode(.0))]
    InvalidOldRoot([u8; 32]),

    /// Double-spend attempt, including a duplicate within one call.
    #[error("nullifier 0x{} already used", hex::encode(.0))]
    NullifierAlreadyUsed([u8; 32]),

    /// A ciphertext's declared commitment disagrees with the proved one.
    #[error("ciphertext commitment mismatch at output {index}")]
    CommitmentMismatch { index: usize },

    /// Encrypted-output count disagrees with proved commitment count.
    #[error("expected {expected} encrypted outputs, got {got}")]
    CiphertextCountMismatch { expected: usize, got: usize },

    /// Unknown key-type discriminant on the wire.
    #[error("unsupported key type {0}")]
    UnsupportedKeyType(u8),

    /// Known key type whose capability is not configured.
    #[error("key type {0:?} requires a capability that is not configured")]
    KeyTypeUnavailable(KeyType),

    /// Ephemeral key is not a valid point for its declared curve.
    #[error("malformed ephemeral key for {0:?}")]
    MalformedEphemeralKey(KeyType),

    /// Metadata payload at or beyond the size cap.
    #[error("metadata of {size} bytes exceeds cap of {cap}")]
    MetadataTooLarge { size: usize, cap: usize },

    /// Zero amount where a positive one is required.
    #[error("invalid amount {0}")]
    InvalidAmount(u64),

    /// Withdrawal exceeds the custodied balance.
    #[error("requested {requested} exceeds custodied balance {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    /// Custody transfer for a deposit or withdrawal failed.
    #[error("asset transfer failed: {0}")]
    AssetTransferFailed(String),

    /// The zero hash is reserved and never a valid deposit commitment.
    #[error("deposit commitment must not be the zero hash")]
    ZeroCommitment,

    /// A combined deposit-and-transfer proved no output commitments.
    #[error("proved outputs contain no output commitments")]
    EmptyOutputCommitments,
}

impl LedgerError {
    /// Machine-readable error code, stable across releases.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::ProofInvalid(_) => "PROOF_INVALID",
            LedgerError::VerifierUnconfigured => "VERIFIER_UNCONFIGURED",
            LedgerError::PublicValuesMalformed(_) => "PUBLIC_VALUES_MALFORMED",
            LedgerError::InvalidOldRoot(_) => "INVALID_OLD_ROOT",
            LedgerError::NullifierAlreadyUsed(_) => "NULLIFIER_ALREADY_USED",
            LedgerError::CommitmentMismatch { .. } => "COMMITMENT_MISMATCH",
            LedgerError::CiphertextCountMismatch { .. } => "CIPHERTEXT_COUNT_MISMATCH",
            LedgerError::UnsupportedKeyType(_) => "UNSUPPORTED_KEY_TYPE",
            LedgerError::KeyTypeUnavailable(_) => "KEY_TYPE_UNAVAILABLE",
            LedgerError::MalformedEphemeralKey(_) => "MALFORMED_EPHEMERAL_KEY",
            LedgerError::MetadataTooLarge { .. } => "METADATA_TOO_LARGE",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::AssetTransferFailed(_) => "ASSET_TRANSFER_FAILED",
            LedgerError::ZeroCommitment => "ZERO_COMMITMENT",
            LedgerError::EmptyOutputCommitments => "EMPTY_OUTPUT_COMMITMENTS",
        }
    }

    /// HTTP status code suggestion for API layers.
    pub fn suggested_status_code(&self) -> u16 {
        match self {
            LedgerError::VerifierUnconfigured => 503,
            LedgerError::NullifierAlreadyUsed(_) => 409,
            LedgerError::AssetTransferFailed(_) => 402,
            _ => 400,
        }
    }
}
