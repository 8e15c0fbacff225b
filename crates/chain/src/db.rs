//! Key-value store contract consumed by the ledger, plus two backends.
//!
//! | Backend | Use |
//! |---------|-----|
//! | `MemoryStore` | tests, dry runs |
//! | `LmdbStore` | node persistence (single named database `ledger`) |
//!
//! The ledger never writes to the store while executing transactions.
//! All mutations are collected in a [`WriteBatch`] and applied in one
//! atomic [`KvStore::write`] call on Commit.

use lmdb::{
    Environment,
    Database,
    DatabaseFlags,
    WriteFlags,
    Transaction as LmdbTxn,
    Cursor,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// ERROR TYPE
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum StoreError {
    /// LMDB level failure
    #[error("lmdb: {0}")]
    Lmdb(#[from] lmdb::Error),

    /// IO error umum
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ════════════════════════════════════════════════════════════════════════════
// WRITE BATCH
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Ordered list of mutations applied atomically by [`KvStore::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self { Self::default() }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn len(&self) -> usize { self.ops.len() }
    pub fn is_empty(&self) -> bool { self.ops.is_empty() }
    pub fn ops(&self) -> &[BatchOp] { &self.ops }
}

// ════════════════════════════════════════════════════════════════════════════
// STORE CONTRACT
// ════════════════════════════════════════════════════════════════════════════

pub trait KvStore: fmt::Debug + Send + Sync + 'static {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(key.to_vec(), value.to_vec());
        self.write(batch)
    }

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(key.to_vec());
        self.write(batch)
    }

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Apply every op of the batch, or none of them.
    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

// ════════════════════════════════════════════════════════════════════════════
// MEMORY BACKEND
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.inner.read().len() }
    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let map = self.inner.read();
        let out = map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(out)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        for op in batch.ops {
            match op {
                BatchOp::Put(k, v) => { map.insert(k, v); }
                BatchOp::Delete(k) => { map.remove(&k); }
            }
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LMDB BACKEND
// ════════════════════════════════════════════════════════════════════════════

const LEDGER_DB_NAME: &str = "ledger";
pub const DEFAULT_MAP_SIZE: usize = 1_000_000_000;

pub struct LmdbStore {
    env: Environment,
    db: Database,
}

impl fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStore").finish_non_exhaustive()
    }
}

impl LmdbStore {
    /// Open (or create) the environment at path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: impl AsRef<Path>, map_size: usize) -> Result<Self, StoreError> {
        let p = path.as_ref();
        std::fs::create_dir_all(p)?;

        let env = Environment::new()
            .set_max_dbs(4)
            .set_map_size(map_size)
            .open(p)?;
        let db = env.create_db(Some(LEDGER_DB_NAME), DatabaseFlags::empty())?;
        Ok(Self { env, db })
    }
}

impl KvStore for LmdbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.db, &key) {
            Ok(v) => Ok(Some(v.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let rtxn = self.env.begin_ro_txn()?;
        let mut out = Vec::new();
        {
            let mut cursor = rtxn.open_ro_cursor(self.db)?;
            // seek to the first key >= prefix; iter_from panics when there is none
            match cursor.get(Some(prefix), None, lmdb_sys::MDB_SET_RANGE) {
                Ok(_) => {}
                Err(lmdb::Error::NotFound) => return Ok(out),
                Err(e) => return Err(e.into()),
            }
            for (key, val) in cursor.iter_from(prefix) {
                if !key.starts_with(prefix) {
                    break;
                }
                out.push((key.to_vec(), val.to_vec()));
            }
        }
        Ok(out)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut wtxn = self.env.begin_rw_txn()?;
        for op in batch.ops {
            match op {
                BatchOp::Put(k, v) => wtxn.put(self.db, &k, &v, WriteFlags::empty())?,
                BatchOp::Delete(k) => match wtxn.del(self.db, &k, None) {
                    Ok(()) | Err(lmdb::Error::NotFound) => {}
                    Err(e) => return Err(e.into()),
                },
            }
        }
        // dropping wtxn without commit aborts the whole batch
        wtxn.commit()?;
        Ok(())
    }
}
