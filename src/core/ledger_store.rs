//! Local ledger store
//!
//! Durable record of every payout obligation, backed by an embedded sled
//! database. One store per currency.
//!
//! # Layout
//!
//! - `obligations`: big-endian obligation id → JSON record
//! - `external_ids`: remote external id → obligation id (uniqueness index)
//! - `meta`: id sequence
//!
//! # Exclusive access
//!
//! All access goes through a [`LedgerSession`] obtained from
//! [`LedgerStore::begin`]. A session holds the whole-store lock for its entire
//! lifetime, so a read-decide-write sequence such as "select unlocked
//! obligations, aggregate, lock them" is atomic with respect to every other
//! session. sled keeps an OS file lock on the database directory, so a second
//! process cannot open the same store at all.
//!
//! A session stages inserts and updates in memory. Reads through the session
//! see staged changes. [`LedgerSession::commit`] writes everything in a single
//! multi-tree transaction and flushes; [`LedgerSession::rollback`] (or dropping
//! the session) discards whatever was not committed.

use crate::types::{NewObligation, Obligation, ObligationId, PayoutError};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

mod trees {
    pub const OBLIGATIONS: &str = "obligations";
    pub const EXTERNAL_IDS: &str = "external_ids";
    pub const META: &str = "meta";
}

const NEXT_ID_KEY: &[u8] = b"next_id";

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open ledger store: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("External id {0} already exists")]
    DuplicateExternalId(String),

    #[error("Store lock poisoned by an earlier panic")]
    Poisoned,
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

impl From<StoreError> for PayoutError {
    fn from(err: StoreError) -> Self {
        PayoutError::store(err.to_string())
    }
}

/// Durable obligation store with whole-store exclusive sessions
pub struct LedgerStore {
    db: sled::Db,
    obligations: sled::Tree,
    external_ids: sled::Tree,
    meta: sled::Tree,
    gate: Mutex<()>,
}

impl LedgerStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        let obligations = db.open_tree(trees::OBLIGATIONS)?;
        let external_ids = db.open_tree(trees::EXTERNAL_IDS)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            obligations,
            external_ids,
            meta,
            gate: Mutex::new(()),
        })
    }

    /// Acquire the exclusive lock and start a unit of work.
    ///
    /// Blocks while another session is open.
    pub fn begin(&self) -> Result<LedgerSession<'_>, StoreError> {
        let guard = self.gate.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(LedgerSession {
            store: self,
            _guard: guard,
            updates: BTreeMap::new(),
            inserts: Vec::new(),
            clear: false,
        })
    }

    /// Number of persisted obligations
    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    fn load_all(&self) -> Result<Vec<Obligation>, StoreError> {
        let mut all = Vec::with_capacity(self.obligations.len());
        for entry in self.obligations.iter() {
            let (_, bytes) = entry?;
            all.push(decode(&bytes)?);
        }
        Ok(all)
    }

    /// Every key of the three trees, for a wipe staged by a session
    fn all_keys(&self) -> Result<[Vec<sled::IVec>; 3], StoreError> {
        let keys = |tree: &sled::Tree| -> Result<Vec<sled::IVec>, StoreError> {
            tree.iter().keys().map(|key| key.map_err(StoreError::from)).collect()
        };
        Ok([
            keys(&self.obligations)?,
            keys(&self.external_ids)?,
            keys(&self.meta)?,
        ])
    }
}

fn encode(obligation: &Obligation) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(obligation).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Obligation, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

fn decode_next_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::DeserializationFailed("Invalid id sequence length".to_string()))?;
    Ok(u64::from_be_bytes(arr))
}

/// Exclusive unit of work over a [`LedgerStore`]
pub struct LedgerSession<'a> {
    store: &'a LedgerStore,
    _guard: MutexGuard<'a, ()>,
    updates: BTreeMap<ObligationId, Obligation>,
    inserts: Vec<NewObligation>,
    clear: bool,
}

impl LedgerSession<'_> {
    /// All obligations as this session sees them (persisted plus staged
    /// updates), in id order. Staged inserts are visible only after commit.
    pub fn all(&self) -> Result<Vec<Obligation>, StoreError> {
        if self.clear {
            return Ok(Vec::new());
        }
        let mut all = self.store.load_all()?;
        for obligation in all.iter_mut() {
            if let Some(staged) = self.updates.get(&obligation.id) {
                *obligation = staged.clone();
            }
        }
        Ok(all)
    }

    /// Obligations matching a predicate, in id order
    pub fn select<F>(&self, predicate: F) -> Result<Vec<Obligation>, StoreError>
    where
        F: Fn(&Obligation) -> bool,
    {
        Ok(self.all()?.into_iter().filter(|o| predicate(o)).collect())
    }

    /// Look up one obligation by id
    pub fn get(&self, id: ObligationId) -> Result<Option<Obligation>, StoreError> {
        if self.clear {
            return Ok(None);
        }
        if let Some(staged) = self.updates.get(&id) {
            return Ok(Some(staged.clone()));
        }
        match self.store.obligations.get(id.to_key())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether an external id is already persisted or staged for insert
    pub fn contains_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        if self.inserts.iter().any(|n| n.external_id == external_id) {
            return Ok(true);
        }
        if self.clear {
            return Ok(false);
        }
        Ok(self.store.external_ids.contains_key(external_id.as_bytes())?)
    }

    /// Stage a new obligation
    pub fn insert(&mut self, obligation: NewObligation) {
        self.inserts.push(obligation);
    }

    /// Stage a modified obligation
    pub fn update(&mut self, obligation: Obligation) {
        self.updates.insert(obligation.id, obligation);
    }

    /// Stage a wipe of the whole store
    pub fn reset(&mut self) {
        self.updates.clear();
        self.inserts.clear();
        self.clear = true;
    }

    /// Whether anything is staged
    pub fn has_pending(&self) -> bool {
        self.clear || !self.updates.is_empty() || !self.inserts.is_empty()
    }

    /// Discard all staged work
    pub fn rollback(&mut self) {
        self.updates.clear();
        self.inserts.clear();
        self.clear = false;
    }

    /// Durably write all staged work. Returns the newly inserted obligations
    /// with their assigned ids.
    pub fn commit(&mut self) -> Result<Vec<Obligation>, StoreError> {
        // a staged wipe is applied in the same transaction as the rest
        let wiped = if self.clear {
            Some(self.store.all_keys()?)
        } else {
            None
        };

        let updates = self
            .updates
            .values()
            .map(|o| Ok((o.id.to_key(), encode(o)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let inserts = &self.inserts;

        let store = self.store;
        let result = (&store.obligations, &store.external_ids, &store.meta).transaction(
            |(obligations, index, meta)| {
                if let Some([obligation_keys, index_keys, meta_keys]) = &wiped {
                    for key in obligation_keys {
                        obligations.remove(key.clone())?;
                    }
                    for key in index_keys {
                        index.remove(key.clone())?;
                    }
                    for key in meta_keys {
                        meta.remove(key.clone())?;
                    }
                }

                let mut next = match meta.get(NEXT_ID_KEY)? {
                    Some(bytes) if wiped.is_none() => {
                        decode_next_id(&bytes).map_err(ConflictableTransactionError::Abort)?
                    }
                    _ => 1,
                };

                let mut created = Vec::with_capacity(inserts.len());
                for new in inserts {
                    if index.get(new.external_id.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            StoreError::DuplicateExternalId(new.external_id.clone()),
                        ));
                    }
                    let obligation = new.clone().into_obligation(ObligationId(next));
                    next += 1;

                    let key = obligation.id.to_key();
                    let bytes = encode(&obligation).map_err(ConflictableTransactionError::Abort)?;
                    obligations.insert(&key[..], bytes)?;
                    index.insert(obligation.external_id.as_bytes(), &key[..])?;
                    created.push(obligation);
                }
                meta.insert(NEXT_ID_KEY, &next.to_be_bytes()[..])?;

                for (key, bytes) in &updates {
                    obligations.insert(&key[..], bytes.clone())?;
                }
                Ok(created)
            },
        );

        let created = result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => StoreError::from(err),
        })?;

        self.store
            .db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;

        self.updates.clear();
        self.inserts.clear();
        self.clear = false;
        Ok(created)
    }
}
