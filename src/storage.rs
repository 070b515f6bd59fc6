//! Durable key/value storage for the draft document.
//!
//! The store only needs string values under a few fixed keys, so the backend
//! seam is the small [`DocumentStorage`] trait. [`LmdbStorage`] is the
//! on-device implementation; [`MemoryStorage`] backs tests and hosts that
//! persist elsewhere.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lmdb::{Database, Environment, Transaction, WriteFlags};
use log::{info, warn};

use crate::error::StorageError;

/// Key holding the raw draft document JSON.
pub const DOCUMENT_KEY: &str = "biodata-draft";

/// Reserved for host preferences; the engine never reads it.
pub const PREFERENCES_KEY: &str = "biodata-preferences";

pub trait DocumentStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites any previous value under `key`.
    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Returns whether a value was present.
    fn remove(&mut self, key: &str) -> Result<bool, StorageError>;
}

/// LMDB environment stored in the directory `{name}.lmdb`.
///
/// The environment's map size doubles as the storage quota: a write that does
/// not fit fails with [`StorageError::QuotaExceeded`].
pub struct LmdbStorage {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl LmdbStorage {
    pub fn open(name: &str, map_size: usize) -> Result<Self, StorageError> {
        let path = PathBuf::from(format!("{name}.lmdb"));
        std::fs::create_dir_all(&path)
            .map_err(|e| StorageError::Backend(format!("Cannot create {}: {e}", path.display())))?;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(map_size)
            .open(&path)?;
        let db = env.open_db(None)?;

        info!("Opened LMDB storage at {}", path.display());
        Ok(Self { env, db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces buffered data to disk.
    pub fn sync(&self) -> Result<(), StorageError> {
        self.env.sync(true)?;
        Ok(())
    }

    /// Closes the environment and deletes its directory.
    pub fn destroy(self) -> Result<(), StorageError> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_dir_all(&path).map_err(|e| {
            warn!("Failed to remove {}: {e}", path.display());
            StorageError::Backend(e.to_string())
        })
    }
}

impl DocumentStorage for LmdbStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| StorageError::Serialization(format!("Stored value is not UTF-8: {e}")))?,
            ),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.abort();
        Ok(value)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        let mut txn = self.env.begin_rw_txn()?;
        let removed = match txn.del(self.db, &key, None) {
            Ok(()) => true,
            Err(lmdb::Error::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        txn.commit()?;
        Ok(removed)
    }
}

/// In-process storage with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes once the stored values would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn set_quota(&mut self, quota_bytes: Option<usize>) {
        self.quota_bytes = quota_bytes;
    }
}

impl DocumentStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let others: usize = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "{needed} bytes needed, quota is {quota}"
                )));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }
}
