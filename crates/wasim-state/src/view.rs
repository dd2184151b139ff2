use crate::db::{ColumnFamily, Database};
use crate::error::StorageError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use wasim_types::Hash;

/// Read capability over simulation state.
///
/// Key absence is a first-class value: `Ok(None)`, never an error.
pub trait StateRead {
    fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
}

/// A buffered entry: a put carries bytes, a delete is a tombstone.
type PendingOp = Option<Vec<u8>>;

/// Transactional view over the database with a pending-writes buffer.
///
/// Mutations accumulate in the buffer and become durable only on `commit`,
/// which flushes them as one atomic batch. Reads see the buffer overlaid on
/// the backing store. The handle is cheaply cloneable and clones share one
/// buffer, so a nested program call writes into the same transaction as its
/// caller; only the outermost driver step commits or discards.
#[derive(Clone)]
pub struct StateView {
    db: Arc<Database>,
    pending: Arc<RwLock<BTreeMap<Vec<u8>, PendingOp>>>,
}

impl StateView {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            pending: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Buffer a put.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.write().insert(key, Some(value));
    }

    /// Buffer a delete.
    pub fn remove(&self, key: Vec<u8>) {
        self.pending.write().insert(key, None);
    }

    /// Atomically apply the buffer to the backing store and clear it.
    /// Returns the new state root.
    pub fn commit(&self) -> Result<Hash, StorageError> {
        let ops = std::mem::take(&mut *self.pending.write());
        if ops.is_empty() {
            return Ok(self.db.root());
        }

        let mut batch = self.db.new_write_batch();
        for (key, op) in &ops {
            match op {
                Some(value) => batch.put(key, value)?,
                None => batch.delete(key)?,
            }
        }
        self.db.write(batch)
    }

    /// Drop all buffered mutations.
    pub fn discard(&self) {
        self.pending.write().clear();
    }

    /// Whether the buffer holds any mutations.
    pub fn has_pending(&self) -> bool {
        !self.pending.read().is_empty()
    }

    /// The Merkle root of the committed state.
    pub fn root(&self) -> Hash {
        self.db.root()
    }
}

impl StateRead for StateView {
    fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(op) = self.pending.read().get(key) {
            // a buffered delete hides the stored value
            return Ok(op.clone());
        }
        self.db.get(ColumnFamily::State, key)
    }
}
