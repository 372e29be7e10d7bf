//! The zkpl shielded ledger core.
//!
//! Deposits create opaque commitments, transfers consume and produce
//! commitments while revealing only nullifiers, and withdrawals release
//! value to a public recipient. The core composes four pieces:
//!
//! - an append-only incremental Merkle accumulator over commitments
//!   (`zkpl-accumulator`),
//! - a root history in which every root the accumulator has ever held stays
//!   admissible forever, so proofs generated against stale snapshots still
//!   land (`history`),
//! - a nullifier set enforcing at-most-once spend, the sole double-spend
//!   guard (`nullifier`),
//! - a transaction admission protocol that verifies an external proof and
//!   decodes the transition intent out of the verified payload itself
//!   (`ledger`).
//!
//! Every state-changing call is all-or-nothing: any failure restores the
//! pre-call state and emits nothing.

pub mod custody;
pub mod error;
pub mod events;
pub mod history;
pub mod keys;
pub mod ledger;
pub mod nullifier;
pub mod verifier;

pub use custody::{Approval, AssetCustody, CustodyError, InMemoryCustody};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use history::RootHistory;
pub use keys::KeyTypeRegistry;
pub use ledger::{LedgerConfig, ShieldedLedger, METADATA_SIZE_CAP};
pub use nullifier::NullifierSet;
pub use verifier::{DigestBindingVerifier, ProofVerifier, VerifierError};
