use crate::error::StorageError;
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;
use wasim_crypto::MerkleTree;
use wasim_types::Hash;

/// Meta key holding the persisted state root.
const STATE_ROOT_KEY: &[u8] = b"state_root";

/// Column families for organized data storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFamily {
    /// Simulation state: prefixed keys → program bytes / named keys
    State,
    /// Metadata: state root, format markers
    Meta,
}

impl ColumnFamily {
    fn name(&self) -> &'static str {
        match self {
            ColumnFamily::State => "state",
            ColumnFamily::Meta => "meta",
        }
    }

    fn all() -> Vec<ColumnFamily> {
        vec![ColumnFamily::State, ColumnFamily::Meta]
    }
}

/// Database configuration options.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Cache size in MB
    pub cache_size_mb: usize,
    /// Max open files
    pub max_open_files: i32,
    /// Write buffer size in MB
    pub write_buffer_size_mb: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: 64,
            max_open_files: 512,
            write_buffer_size_mb: 16,
        }
    }
}

/// RocksDB wrapper with a Merkle index over the state column.
///
/// The root is recomputed from an ordered scan after every committed batch
/// and persisted under `meta/state_root`. The simulator commits once per
/// plan step, so the scan stays proportional to local plan sizes.
pub struct Database {
    db: Arc<DB>,
    root: RwLock<Hash>,
}

impl Database {
    /// Open a database at the given path.
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);

        let cache = rocksdb::Cache::new_lru_cache(config.cache_size_mb * 1024 * 1024);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ColumnFamily::all()
            .into_iter()
            .map(|cf| ColumnFamilyDescriptor::new(cf.name(), Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        let database = Self {
            db: Arc::new(db),
            root: RwLock::new(Hash::ZERO),
        };
        let root = match database.get(ColumnFamily::Meta, STATE_ROOT_KEY)? {
            Some(bytes) => Hash::from_slice(&bytes)
                .map_err(|e| StorageError::Corrupt(format!("state root: {}", e)))?,
            None => database.compute_root()?,
        };
        *database.root.write() = root;

        Ok(database)
    }

    /// Get a value from the database.
    pub fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf_handle = self
            .db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily(cf.name().to_string()))?;

        let result = self.db.get_cf(&cf_handle, key)?;
        Ok(result)
    }

    /// Create a new write batch against the state column.
    pub fn new_write_batch(&self) -> WriteBatch {
        WriteBatch::new(self.db.clone())
    }

    /// Atomically apply a batch, then refresh and persist the state root.
    /// Returns the new root.
    pub fn write(&self, batch: WriteBatch) -> Result<Hash, StorageError> {
        self.db.write(batch.inner)?;

        let root = self.compute_root()?;
        let meta = self
            .db
            .cf_handle(ColumnFamily::Meta.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily("meta".to_string()))?;
        self.db.put_cf(&meta, STATE_ROOT_KEY, root.as_bytes())?;
        *self.root.write() = root;

        tracing::debug!(root = %root, "state committed");
        Ok(root)
    }

    /// The Merkle root over the current state column.
    pub fn root(&self) -> Hash {
        *self.root.read()
    }

    /// Rebuild the Merkle root from an ordered scan of the state column.
    fn compute_root(&self) -> Result<Hash, StorageError> {
        let cf_handle = self
            .db
            .cf_handle(ColumnFamily::State.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily("state".to_string()))?;

        let mut leaves = Vec::new();
        for entry in self.db.iterator_cf(&cf_handle, IteratorMode::Start) {
            let (key, value) = entry?;
            leaves.push(Hash::entry(&key, &value));
        }

        Ok(MerkleTree::from_leaves(&leaves).root())
    }
}

/// Write batch for atomic state mutations.
pub struct WriteBatch {
    inner: rocksdb::WriteBatch,
    db: Arc<DB>,
}

impl WriteBatch {
    fn new(db: Arc<DB>) -> Self {
        Self {
            inner: rocksdb::WriteBatch::default(),
            db,
        }
    }

    /// Put a value into the batch.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf_handle = self
            .db
            .cf_handle(ColumnFamily::State.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily("state".to_string()))?;

        self.inner.put_cf(&cf_handle, key, value);
        Ok(())
    }

    /// Delete a value in the batch.
    pub fn delete(&mut self, key: &[u8]) -> Result<(), StorageError> {
        let cf_handle = self
            .db
            .cf_handle(ColumnFamily::State.name())
            .ok_or_else(|| StorageError::InvalidColumnFamily("state".to_string()))?;

        self.inner.delete_cf(&cf_handle, key);
        Ok(())
    }

    /// Check if batch is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
