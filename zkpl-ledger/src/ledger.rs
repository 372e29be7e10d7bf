//! The ledger state machine.
//!
//! A call moves through verify → decode → admit → consume → insert, and any
//! failure restores the pre-call state wholesale. The host embedding this
//! ledger serializes calls, so each operation runs to completion against a
//! consistent snapshot; the interesting concurrency is provers racing each
//! other offline, which the historical-root admission policy absorbs.

use std::collections::HashMap;

use tracing::{debug, info};
use zkpl_accumulator::IncrementalTree;
use zkpl_common::{Commitment, Nullifier, OutputCiphertext, PublicOutputs, ZERO_HASH};

use crate::custody::{Approval, AssetCustody, CustodyError};
use crate::error::LedgerError;
use crate::events::{
    DepositedEvent, LedgerEvent, MetadataPostedEvent, OutputCommittedEvent, RootUpdatedEvent,
    WithdrawnEvent,
};
use crate::history::RootHistory;
use crate::keys::KeyTypeRegistry;
use crate::nullifier::NullifierSet;
use crate::verifier::ProofVerifier;

/// Metadata blobs at or beyond this size are rejected.
pub const METADATA_SIZE_CAP: usize = 100_000;

/// Tunables for a ledger instance.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub metadata_size_cap: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            metadata_size_cap: METADATA_SIZE_CAP,
        }
    }
}

/// The shared mutable ledger state. Cloned as a checkpoint at the start of
/// each fallible operation and restored on failure, which is what makes
/// every call all-or-nothing.
#[derive(Clone)]
struct LedgerState {
    tree: IncrementalTree,
    roots: RootHistory,
    nullifiers: NullifierSet,
    total_deposited: u64,
    metadata: HashMap<Commitment, Vec<u8>>,
    ciphertexts: HashMap<Commitment, OutputCiphertext>,
}

impl LedgerState {
    fn genesis() -> Self {
        let tree = IncrementalTree::new();
        let roots = RootHistory::new(tree.root());
        Self {
            tree,
            roots,
            nullifiers: NullifierSet::new(),
            total_deposited: 0,
            metadata: HashMap::new(),
            ciphertexts: HashMap::new(),
        }
    }
}

/// The privacy-preserving value ledger.
///
/// Owns the accumulator, root history, nullifier set, and balance counter;
/// nothing else mutates them. The proof verifier and asset custody are
/// injected capabilities.
pub struct ShieldedLedger {
    state: LedgerState,
    verifier: Option<Box<dyn ProofVerifier>>,
    verification_key: Vec<u8>,
    custody: Box<dyn AssetCustody>,
    key_types: KeyTypeRegistry,
    config: LedgerConfig,
    events: Vec<LedgerEvent>,
}

impl ShieldedLedger {
    /// A genesis ledger: empty accumulator, its root seeded into history.
    pub fn new(custody: Box<dyn AssetCustody>) -> Self {
        Self::with_config(custody, LedgerConfig::default())
    }

    pub fn with_config(custody: Box<dyn AssetCustody>, config: LedgerConfig) -> Self {
        Self {
            state: LedgerState::genesis(),
            verifier: None,
            verification_key: Vec::new(),
            custody,
            key_types: KeyTypeRegistry::standard(),
            config,
            events: Vec::new(),
        }
    }

    /// Rebuild a ledger from persisted state by replaying the leaf log.
    ///
    /// Replaying inserts regenerates the root history exactly as the
    /// original insert sequence did.
    pub fn restore(
        custody: Box<dyn AssetCustody>,
        leaves: &[Commitment],
        nullifiers: &[Nullifier],
        total_deposited: u64,
        metadata: HashMap<Commitment, Vec<u8>>,
        ciphertexts: HashMap<Commitment, OutputCiphertext>,
    ) -> Self {
        let mut ledger = Self::new(custody);
        for leaf in leaves {
            let (root, _) = ledger.state.tree.insert(*leaf);
            ledger.state.roots.insert(root);
        }
        for nullifier in nullifiers {
            // Persisted nullifiers were admitted once already.
            let _ = ledger.state.nullifiers.consume(*nullifier);
        }
        ledger.state.total_deposited = total_deposited;
        ledger.state.metadata = metadata;
        ledger.state.ciphertexts = ciphertexts;
        ledger
    }

    /// Install the proof-verification capability. Until this is called,
    /// every proof-carrying operation fails with `VerifierUnconfigured`.
    pub fn install_verifier(&mut self, verifier: Box<dyn ProofVerifier>, verification_key: Vec<u8>) {
        self.verifier = Some(verifier);
        self.verification_key = verification_key;
    }

    /// Enable the optional secp256r1 ciphertext capability.
    pub fn enable_secp256r1(&mut self) {
        self.key_types.enable_secp256r1();
    }

    // ------------------------------------------------------------------
    // State-changing operations
    // ------------------------------------------------------------------

    /// Deposit `amount` under `commitment`, pulling custody from `depositor`.
    /// Returns the leaf index the commitment landed at.
    pub fn deposit(
        &mut self,
        commitment: Commitment,
        ciphertext: &OutputCiphertext,
        amount: u64,
        depositor: &str,
        metadata: Option<&[u8]>,
    ) -> Result<u64, LedgerError> {
        self.deposit_inner(commitment, ciphertext, amount, depositor, metadata, None)
    }

    /// Deposit using a signed single-use approval instead of a direct
    /// custody call by the depositor.
    #[allow(clippy::too_many_arguments)]
    pub fn deposit_with_approval(
        &mut self,
        commitment: Commitment,
        ciphertext: &OutputCiphertext,
        amount: u64,
        approval: &Approval,
        signature: &[u8],
        depositor: &str,
        metadata: Option<&[u8]>,
    ) -> Result<u64, LedgerError> {
        if approval.token != self.custody.asset_id() {
            return Err(LedgerError::AssetTransferFailed(format!(
                "approval covers asset {}, pool custodies {}",
                approval.token,
                self.custody.asset_id()
            )));
        }
        if approval.amount < amount {
            return Err(LedgerError::AssetTransferFailed(format!(
                "approval authorizes {}, deposit needs {}",
                approval.amount, amount
            )));
        }
        self.deposit_inner(
            commitment,
            ciphertext,
            amount,
            depositor,
            metadata,
            Some((approval, signature)),
        )
    }

    fn deposit_inner(
        &mut self,
        commitment: Commitment,
        ciphertext: &OutputCiphertext,
        amount: u64,
        depositor: &str,
        metadata: Option<&[u8]>,
        approval: Option<(&Approval, &[u8])>,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if ciphertext.commitment != commitment {
            return Err(LedgerError::CommitmentMismatch { index: 0 });
        }
        self.key_types.validate(ciphertext)?;
        self.check_metadata(metadata)?;

        // Custody moves first; every later step is infallible, so no
        // compensation path is needed here.
        let transfer = match approval {
            Some((approval, signature)) => self
                .custody
                .transfer_in_with_approval(approval, signature, depositor, amount),
            None => self.custody.transfer_in(depositor, amount),
        };
        transfer.map_err(custody_failure)?;

        let mut staged = Vec::new();
        let index = self.insert_output(commitment, Some(ciphertext), &mut staged);
        staged.insert(
            0,
            LedgerEvent::Deposited(DepositedEvent {
                from: depositor.to_string(),
                amount,
                commitment,
                leaf_index: index,
            }),
        );
        self.state.total_deposited += amount;
        self.post_metadata(commitment, metadata, &mut staged);

        info!(
            leaf_index = index,
            amount,
            total_deposited = self.state.total_deposited,
            "deposit committed"
        );
        self.events.extend(staged);
        Ok(index)
    }

    /// Apply a proved transfer: consume nullifiers, insert output
    /// commitments, publish ciphertexts.
    pub fn submit_transfer(
        &mut self,
        encrypted_outputs: &[OutputCiphertext],
        proof: &[u8],
        public_values: &[u8],
        output_metadata: &[Option<Vec<u8>>],
    ) -> Result<(), LedgerError> {
        let outputs = self.verify_and_decode(proof, public_values)?;

        let checkpoint = self.state.clone();
        let mut staged = Vec::new();
        let result =
            self.apply_outputs(&outputs, encrypted_outputs, output_metadata, &mut staged);
        match result {
            Ok(()) => {
                info!(
                    nullifiers = outputs.nullifiers.len(),
                    outputs = outputs.output_commitments.len(),
                    "transfer committed"
                );
                self.events.extend(staged);
                Ok(())
            }
            Err(err) => {
                self.state = checkpoint;
                debug!(error = %err, "transfer rejected, state restored");
                Err(err)
            }
        }
    }

    /// Release `amount` to a public `recipient`, inserting any proved change
    /// outputs back into the pool.
    pub fn withdraw(
        &mut self,
        recipient: &str,
        amount: u64,
        proof: &[u8],
        public_values: &[u8],
        change_outputs: &[OutputCiphertext],
    ) -> Result<(), LedgerError> {
        let outputs = self.verify_and_decode(proof, public_values)?;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if amount > self.state.total_deposited {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.state.total_deposited,
            });
        }

        let checkpoint = self.state.clone();
        let mut staged = Vec::new();
        let result = self
            .apply_outputs(&outputs, change_outputs, &[], &mut staged)
            .and_then(|()| {
                self.state.total_deposited -= amount;
                self.custody
                    .transfer_out(recipient, amount)
                    .map_err(custody_failure)
            });
        match result {
            Ok(()) => {
                staged.push(LedgerEvent::Withdrawn(WithdrawnEvent {
                    to: recipient.to_string(),
                    amount,
                }));
                info!(
                    amount,
                    total_deposited = self.state.total_deposited,
                    "withdrawal committed"
                );
                self.events.extend(staged);
                Ok(())
            }
            Err(err) => {
                self.state = checkpoint;
                debug!(error = %err, "withdrawal rejected, state restored");
                Err(err)
            }
        }
    }

    /// Atomically deposit a fresh commitment and apply a proved transfer.
    ///
    /// The deposit commitment is inserted before proof verification because
    /// it is not part of the proved statement; it still rolls back with
    /// everything else if the proof fails.
    pub fn deposit_and_transfer(
        &mut self,
        deposit_commitment: Commitment,
        encrypted_outputs: &[OutputCiphertext],
        proof: &[u8],
        public_values: &[u8],
        amount: u64,
        depositor: &str,
    ) -> Result<(), LedgerError> {
        if deposit_commitment == ZERO_HASH {
            return Err(LedgerError::ZeroCommitment);
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if self.verifier.is_none() {
            return Err(LedgerError::VerifierUnconfigured);
        }

        self.custody
            .transfer_in(depositor, amount)
            .map_err(custody_failure)?;

        let checkpoint = self.state.clone();
        let mut staged = Vec::new();

        let index = self.insert_output(deposit_commitment, None, &mut staged);
        staged.insert(
            0,
            LedgerEvent::Deposited(DepositedEvent {
                from: depositor.to_string(),
                amount,
                commitment: deposit_commitment,
                leaf_index: index,
            }),
        );

        let result = self
            .verify_and_decode(proof, public_values)
            .and_then(|outputs| {
                if outputs.output_commitments.is_empty() {
                    return Err(LedgerError::EmptyOutputCommitments);
                }
                self.apply_outputs(&outputs, encrypted_outputs, &[], &mut staged)
            });
        match result {
            Ok(()) => {
                self.state.total_deposited += amount;
                info!(amount, leaf_index = index, "deposit-and-transfer committed");
                self.events.extend(staged);
                Ok(())
            }
            Err(err) => {
                self.state = checkpoint;
                // The custody pull must be unwound too; the pool just
                // received exactly this amount, so the refund cannot fail.
                if let Err(refund) = self.custody.transfer_out(depositor, amount) {
                    tracing::error!(error = %refund, "deposit refund failed");
                }
                debug!(error = %err, "deposit-and-transfer rejected, state restored");
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Read-only surface
    // ------------------------------------------------------------------

    pub fn current_root(&self) -> [u8; 32] {
        self.state.tree.root()
    }

    pub fn next_leaf_index(&self) -> u64 {
        self.state.tree.next_index()
    }

    pub fn nullifier_used(&self, nullifier: &Nullifier) -> bool {
        self.state.nullifiers.is_used(nullifier)
    }

    pub fn total_deposited(&self) -> u64 {
        self.state.total_deposited
    }

    /// Custodied asset balance; always equals `total_deposited`.
    pub fn pool_balance(&self) -> u64 {
        self.custody.pool_balance()
    }

    pub fn metadata_of(&self, commitment: &Commitment) -> Option<&[u8]> {
        self.state.metadata.get(commitment).map(Vec::as_slice)
    }

    /// The encrypted note payload published for a commitment, if any.
    /// Recipients scan these to find outputs addressed to them.
    pub fn ciphertext_of(&self, commitment: &Commitment) -> Option<&OutputCiphertext> {
        self.state.ciphertexts.get(commitment)
    }

    /// Every published ciphertext, keyed by commitment.
    pub fn ciphertext_entries(&self) -> impl Iterator<Item = (&Commitment, &OutputCiphertext)> {
        self.state.ciphertexts.iter()
    }

    pub fn leaves(&self) -> &[Commitment] {
        self.state.tree.leaves()
    }

    pub fn root_known(&self, root: &[u8; 32]) -> bool {
        self.state.roots.contains(root)
    }

    /// Every nullifier consumed so far, in no particular order.
    pub fn used_nullifiers(&self) -> impl Iterator<Item = &Nullifier> {
        self.state.nullifiers.iter()
    }

    /// Every stored metadata blob, keyed by commitment.
    pub fn metadata_entries(&self) -> impl Iterator<Item = (&Commitment, &[u8])> {
        self.state
            .metadata
            .iter()
            .map(|(commitment, blob)| (commitment, blob.as_slice()))
    }

    /// Membership proof for an inserted leaf, for external provers.
    pub fn prove_leaf(&self, index: usize) -> Option<zkpl_accumulator::MerkleProof> {
        self.state.tree.prove(index)
    }

    /// Take all notifications published since the last drain.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn verify_and_decode(
        &self,
        proof: &[u8],
        public_values: &[u8],
    ) -> Result<PublicOutputs, LedgerError> {
        let verifier = self
            .verifier
            .as_deref()
            .ok_or(LedgerError::VerifierUnconfigured)?;
        verifier
            .verify(&self.verification_key, public_values, proof)
            .map_err(|e| LedgerError::ProofInvalid(e.to_string()))?;
        // The transition intent is decoded from the verified buffer itself,
        // never from a caller-supplied side channel.
        PublicOutputs::abi_decode(public_values)
            .map_err(|e| LedgerError::PublicValuesMalformed(e.to_string()))
    }

    /// Admission, nullifier consumption, and output insertion shared by
    /// transfer, withdraw, and deposit-and-transfer.
    fn apply_outputs(
        &mut self,
        outputs: &PublicOutputs,
        ciphertexts: &[OutputCiphertext],
        output_metadata: &[Option<Vec<u8>>],
        staged: &mut Vec<LedgerEvent>,
    ) -> Result<(), LedgerError> {
        if !self.state.roots.contains(&outputs.old_root) {
            return Err(LedgerError::InvalidOldRoot(outputs.old_root));
        }

        // Per-nullifier, immediately: a duplicate inside this list fails on
        // its second occurrence.
        for nullifier in &outputs.nullifiers {
            self.state.nullifiers.consume(*nullifier)?;
        }

        if ciphertexts.len() != outputs.output_commitments.len() {
            return Err(LedgerError::CiphertextCountMismatch {
                expected: outputs.output_commitments.len(),
                got: ciphertexts.len(),
            });
        }
        if !output_metadata.is_empty() && output_metadata.len() != ciphertexts.len() {
            return Err(LedgerError::CiphertextCountMismatch {
                expected: ciphertexts.len(),
                got: output_metadata.len(),
            });
        }

        for (index, (commitment, ciphertext)) in outputs
            .output_commitments
            .iter()
            .zip(ciphertexts)
            .enumerate()
        {
            if ciphertext.commitment != *commitment {
                return Err(LedgerError::CommitmentMismatch { index });
            }
            self.key_types.validate(ciphertext)?;
            let metadata = output_metadata.get(index).and_then(Option::as_deref);
            self.check_metadata(metadata)?;

            self.insert_output(*commitment, Some(ciphertext), staged);
            self.post_metadata(*commitment, metadata, staged);
        }
        Ok(())
    }

    /// Insert one commitment, extend the root history, stage notifications.
    fn insert_output(
        &mut self,
        commitment: Commitment,
        ciphertext: Option<&OutputCiphertext>,
        staged: &mut Vec<LedgerEvent>,
    ) -> u64 {
        let old_root = self.state.tree.root();
        let (new_root, index) = self.state.tree.insert(commitment);
        self.state.roots.insert(new_root);

        if let Some(ct) = ciphertext {
            self.state.ciphertexts.insert(commitment, ct.clone());
            staged.push(LedgerEvent::OutputCommitted(OutputCommittedEvent {
                commitment,
                key_type: ct.key_type,
                ephemeral_pubkey: ct.ephemeral_pubkey.clone(),
                nonce: ct.nonce,
                ciphertext: ct.ciphertext.clone(),
                leaf_index: index,
            }));
        }
        staged.push(LedgerEvent::RootUpdated(RootUpdatedEvent {
            old_root,
            new_root,
        }));
        index
    }

    fn post_metadata(
        &mut self,
        commitment: Commitment,
        metadata: Option<&[u8]>,
        staged: &mut Vec<LedgerEvent>,
    ) {
        if let Some(blob) = metadata {
            self.state.metadata.insert(commitment, blob.to_vec());
            staged.push(LedgerEvent::MetadataPosted(MetadataPostedEvent {
                commitment,
                size: blob.len(),
            }));
        }
    }

    fn check_metadata(&self, metadata: Option<&[u8]>) -> Result<(), LedgerError> {
        if let Some(blob) = metadata {
            if blob.len() >= self.config.metadata_size_cap {
                return Err(LedgerError::MetadataTooLarge {
                    size: blob.len(),
                    cap: self.config.metadata_size_cap,
                });
            }
        }
        Ok(())
    }
}

fn custody_failure(err: CustodyError) -> LedgerError {
    LedgerError::AssetTransferFailed(err.to_string())
}
