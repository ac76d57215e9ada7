//! Record store abstraction for the registry's durable state.
//!
//! The registry never talks to a storage engine directly. Everything it keeps
//! (table schemas, rows, the admin identity) goes through [`RecordStore`], a
//! flat keyed store over opaque byte values. The host supplies the
//! implementation and is responsible for wrapping one call in one atomic unit
//! of work; within that unit the store must give read-your-writes.
//!
//! Two implementations ship with the crate:
//! - [`MemoryRecordStore`]: in-process `BTreeMap`, used by tests and embedders.
//! - [`crate::core::db::SqliteRecordStore`]: a view over a SQLite transaction.

use crate::core::error::StoreError;
use crate::core::schemas;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::PathBuf;

/// Keyed byte storage with the semantics the table layer depends on.
pub trait RecordStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Blind write. Creates or replaces the value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Writes only if `key` is absent. Returns whether the write happened.
    fn insert_if_absent(&mut self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    /// Up to `limit` entries whose key starts with `prefix` and sorts strictly
    /// after `after`, in ascending key order.
    fn scan(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Removes every key under `prefix`. Returns how many were removed.
    fn delete_prefix(&mut self, prefix: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        loop {
            let page = self.scan(prefix, None, 256)?;
            if page.is_empty() {
                return Ok(removed);
            }
            for (key, _) in page {
                self.delete(&key)?;
                removed += 1;
            }
        }
    }
}

/// In-memory record store. Ordered, so scans come back in key order.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    records: BTreeMap<String, Vec<u8>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn insert_if_absent(&mut self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        if self.records.contains_key(key) {
            return Ok(false);
        }
        self.records.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }

    fn scan(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let lower = match after {
            Some(a) if a >= prefix => Bound::Excluded(a.to_string()),
            _ => Bound::Included(prefix.to_string()),
        };
        Ok(self
            .records
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Store handle: the directory holding the registry database, its config
/// and the audit log.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(schemas::REGISTRY_DB_NAME)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join(schemas::AUDIT_LOG_NAME)
    }
}
