//! Durable ledger state.
//!
//! The ledger core is rebuilt at startup by replaying the append-only leaf
//! log, so the store only needs to persist leaves in insertion order plus
//! the nullifier set, metadata blobs, and the balance counter. Writes happen
//! after each committed operation and are idempotent, which keeps a crash
//! between commit and sync recoverable by re-syncing.

use std::collections::HashMap;
use std::io;
use std::{fs, path::Path};

use zkpl_common::{Commitment, Nullifier, OutputCiphertext};
use zkpl_ledger::ShieldedLedger;

const LEAVES_TREE: &str = "leaves";
const NULLIFIERS_TREE: &str = "nullifiers";
const METADATA_TREE: &str = "metadata";
const CIPHERTEXTS_TREE: &str = "ciphertexts";
const COUNTERS_TREE: &str = "counters";
const TOTAL_DEPOSITED_KEY: &[u8] = b"total_deposited";

/// Everything needed to rebuild a ledger, in replay order.
#[derive(Default)]
pub struct PersistedState {
    pub leaves: Vec<Commitment>,
    pub nullifiers: Vec<Nullifier>,
    pub total_deposited: u64,
    pub metadata: HashMap<Commitment, Vec<u8>>,
    pub ciphertexts: HashMap<Commitment, OutputCiphertext>,
}

#[derive(Clone)]
pub struct LedgerStore {
    db: Option<sled::Db>,
}

impl LedgerStore {
    /// No persistence; state lives and dies with the process. Used in tests.
    pub fn in_memory() -> Self {
        Self { db: None }
    }

    pub fn persistent(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(sled::Error::Io)?;
            }
        }
        let db = sled::open(path)?;
        Ok(Self { db: Some(db) })
    }

    /// Load persisted state for replay. Empty when nothing was stored.
    pub fn load(&self) -> Result<PersistedState, sled::Error> {
        let Some(db) = &self.db else {
            return Ok(PersistedState::default());
        };

        let mut state = PersistedState::default();
        // Keys are big-endian indices, so sled's ordered iteration yields
        // leaves in insertion order.
        for entry in db.open_tree(LEAVES_TREE)?.iter() {
            let (_, value) = entry?;
            state.leaves.push(read_hash(&value)?);
        }
        for entry in db.open_tree(NULLIFIERS_TREE)?.iter() {
            let (key, _) = entry?;
            state.nullifiers.push(read_hash(&key)?);
        }
        for entry in db.open_tree(METADATA_TREE)?.iter() {
            let (key, value) = entry?;
            state.metadata.insert(read_hash(&key)?, value.to_vec());
        }
        for entry in db.open_tree(CIPHERTEXTS_TREE)?.iter() {
            let (key, value) = entry?;
            let ciphertext = serde_json::from_slice(&value)
                .map_err(|e| corrupt(format!("stored ciphertext: {e}")))?;
            state.ciphertexts.insert(read_hash(&key)?, ciphertext);
        }
        if let Some(value) = db.open_tree(COUNTERS_TREE)?.get(TOTAL_DEPOSITED_KEY)? {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&value);
            state.total_deposited = u64::from_be_bytes(buf);
        }
        Ok(state)
    }

    /// Write the ledger's current state. Every insert is idempotent.
    pub fn sync(&self, ledger: &ShieldedLedger) -> Result<(), sled::Error> {
        let Some(db) = &self.db else {
            return Ok(());
        };

        let leaves = db.open_tree(LEAVES_TREE)?;
        let stored = leaves.len() as u64;
        for (index, leaf) in ledger.leaves().iter().enumerate().skip(stored as usize) {
            leaves.insert((index as u64).to_be_bytes(), leaf.as_slice())?;
        }

        let nullifiers = db.open_tree(NULLIFIERS_TREE)?;
        for nullifier in ledger.used_nullifiers() {
            nullifiers.insert(nullifier.as_slice(), &[])?;
        }

        let metadata = db.open_tree(METADATA_TREE)?;
        for (commitment, blob) in ledger.metadata_entries() {
            metadata.insert(commitment.as_slice(), blob)?;
        }

        let ciphertexts = db.open_tree(CIPHERTEXTS_TREE)?;
        for (commitment, ciphertext) in ledger.ciphertext_entries() {
            let encoded = serde_json::to_vec(ciphertext)
                .map_err(|e| corrupt(format!("encode ciphertext: {e}")))?;
            ciphertexts.insert(commitment.as_slice(), encoded)?;
        }

        db.open_tree(COUNTERS_TREE)?.insert(
            TOTAL_DEPOSITED_KEY,
            ledger.total_deposited().to_be_bytes().as_slice(),
        )?;
        db.flush()?;
        Ok(())
    }
}

fn read_hash(bytes: &[u8]) -> Result<[u8; 32], sled::Error> {
    bytes
        .try_into()
        .map_err(|_| corrupt(format!("expected 32-byte hash, found {} bytes", bytes.len())))
}

fn corrupt(message: String) -> sled::Error {
    sled::Error::Io(io::Error::new(io::ErrorKind::InvalidData, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkpl_ledger::InMemoryCustody;
    use zkpl_test_fixtures as fixtures;

    fn temp_db_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("zkpl-store-test-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn in_memory_store_loads_empty() {
        let store = LedgerStore::in_memory();
        let state = store.load().unwrap();
        assert!(state.leaves.is_empty());
        assert_eq!(state.total_deposited, 0);
    }

    #[test]
    fn sync_then_load_replays_to_the_same_root() {
        let path = temp_db_path();
        let store = LedgerStore::persistent(&path).unwrap();

        let custody = InMemoryCustody::new("USDC").with_account("alice", 1_000);
        let mut ledger = ShieldedLedger::new(Box::new(custody));
        let commitment = fixtures::commitment(1);
        ledger
            .deposit(
                commitment,
                &fixtures::k1_ciphertext(commitment),
                600,
                "alice",
                Some(b"receipt"),
            )
            .unwrap();
        store.sync(&ledger).unwrap();

        let persisted = store.load().unwrap();
        assert_eq!(persisted.leaves, vec![commitment]);
        assert_eq!(persisted.total_deposited, 600);
        assert_eq!(
            persisted.metadata.get(&commitment).map(Vec::as_slice),
            Some(b"receipt".as_slice())
        );
        assert_eq!(
            persisted.ciphertexts.get(&commitment),
            Some(&fixtures::k1_ciphertext(commitment))
        );

        let restored = ShieldedLedger::restore(
            Box::new(InMemoryCustody::new("USDC").with_pool_balance(600)),
            &persisted.leaves,
            &persisted.nullifiers,
            persisted.total_deposited,
            persisted.metadata,
            persisted.ciphertexts,
        );
        assert_eq!(restored.current_root(), ledger.current_root());
        assert_eq!(restored.next_leaf_index(), 1);
        assert_eq!(
            restored.ciphertext_of(&commitment),
            Some(&fixtures::k1_ciphertext(commitment))
        );

        drop(store);
        let _ = fs::remove_dir_all(&path);
    }

    #[test]
    fn sync_is_idempotent() {
        let path = temp_db_path();
        let store = LedgerStore::persistent(&path).unwrap();

        let custody = InMemoryCustody::new("USDC").with_account("alice", 1_000);
        let mut ledger = ShieldedLedger::new(Box::new(custody));
        let commitment = fixtures::commitment(1);
        ledger
            .deposit(
                commitment,
                &fixtures::k1_ciphertext(commitment),
                100,
                "alice",
                None,
            )
            .unwrap();
        store.sync(&ledger).unwrap();
        store.sync(&ledger).unwrap();

        let persisted = store.load().unwrap();
        assert_eq!(persisted.leaves.len(), 1);
        assert_eq!(persisted.total_deposited, 100);

        drop(store);
        let _ = fs::remove_dir_all(&path);
    }
}
