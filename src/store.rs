//! Durable table storage.
//!
//! The vault is payload-agnostic over a collaborator that persists rows in
//! named tables. The collaborator guarantees auto-assigned unique ids and
//! single-row atomicity, nothing more. Rows carry their sealed payload as
//! an untyped JSON value so that legacy or corrupted rows (anything that
//! is not a valid `{iv, ciphertext}` shape) remain representable and can
//! be skipped on read instead of failing the whole table.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// A persisted row: storage-assigned id plus the sealed payload.
///
/// No plaintext field is ever persisted in a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: u64,
    pub encrypted: serde_json::Value,
}

/// Storage collaborator for named tables of encrypted rows.
///
/// Implement this to back the vault with any row store (embedded database,
/// browser storage bridge, flat files). The vault never inspects payloads
/// here; it only moves sealed values in and out.
pub trait TableStore: Send {
    /// Append a row, returning the assigned id. Ids are unique per table
    /// and monotonically increasing.
    fn put(&mut self, table: &str, encrypted: serde_json::Value) -> Result<u64, VaultError>;

    /// Fetch a single row by id.
    fn get(&self, table: &str, id: u64) -> Result<Option<StoredRow>, VaultError>;

    /// All rows of a table in storage order.
    fn to_array(&self, table: &str) -> Result<Vec<StoredRow>, VaultError>;

    /// Replace the sealed payload of an existing row in place, keeping its
    /// id. Used by PIN rotation to re-seal rows under a new key. A missing
    /// row is a storage failure.
    fn update(&mut self, table: &str, id: u64, encrypted: serde_json::Value)
        -> Result<(), VaultError>;

    /// Remove every row of a table.
    fn clear(&mut self, table: &str) -> Result<(), VaultError>;

    /// Remove a single row by id.
    fn delete(&mut self, table: &str, id: u64) -> Result<(), VaultError>;

    /// Names of all tables that currently hold at least one row.
    fn tables(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store, primarily for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<StoredRow>>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    fn put(&mut self, table: &str, encrypted: serde_json::Value) -> Result<u64, VaultError> {
        self.next_id += 1;
        let id = self.next_id;
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(StoredRow { id, encrypted });
        Ok(id)
    }

    fn get(&self, table: &str, id: u64) -> Result<Option<StoredRow>, VaultError> {
        Ok(self
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned()))
    }

    fn to_array(&self, table: &str) -> Result<Vec<StoredRow>, VaultError> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    fn update(
        &mut self,
        table: &str,
        id: u64,
        encrypted: serde_json::Value,
    ) -> Result<(), VaultError> {
        let row = self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| VaultError::Storage(format!("no row {} in {}", id, table)))?;
        row.encrypted = encrypted;
        Ok(())
    }

    fn clear(&mut self, table: &str) -> Result<(), VaultError> {
        self.tables.remove(table);
        Ok(())
    }

    fn delete(&mut self, table: &str, id: u64) -> Result<(), VaultError> {
        if let Some(rows) = self.tables.get_mut(table) {
            rows.retain(|r| r.id != id);
        }
        Ok(())
    }

    fn tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Simple durable store: the whole table map serialized as one JSON file,
/// rewritten on every mutation. Adequate at personal-tracker volumes.
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

#[derive(Serialize, Deserialize)]
struct FileImage {
    tables: BTreeMap<String, Vec<StoredRow>>,
    next_id: u64,
}

impl JsonFileStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let inner = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| VaultError::Storage(e.to_string()))?;
            let image: FileImage = serde_json::from_str(&raw)?;
            MemoryStore {
                tables: image.tables,
                next_id: image.next_id,
            }
        } else {
            MemoryStore::new()
        };
        Ok(Self { path, inner })
    }

    fn flush(&self) -> Result<(), VaultError> {
        let image = FileImage {
            tables: self.inner.tables.clone(),
            next_id: self.inner.next_id,
        };
        let raw = serde_json::to_string(&image)?;
        fs::write(&self.path, raw).map_err(|e| VaultError::Storage(e.to_string()))
    }
}

impl TableStore for JsonFileStore {
    fn put(&mut self, table: &str, encrypted: serde_json::Value) -> Result<u64, VaultError> {
        let id = self.inner.put(table, encrypted)?;
        self.flush()?;
        Ok(id)
    }

    fn get(&self, table: &str, id: u64) -> Result<Option<StoredRow>, VaultError> {
        self.inner.get(table, id)
    }

    fn to_array(&self, table: &str) -> Result<Vec<StoredRow>, VaultError> {
        self.inner.to_array(table)
    }

    fn update(
        &mut self,
        table: &str,
        id: u64,
        encrypted: serde_json::Value,
    ) -> Result<(), VaultError> {
        self.inner.update(table, id, encrypted)?;
        self.flush()
    }

    fn clear(&mut self, table: &str) -> Result<(), VaultError> {
        self.inner.clear(table)?;
        self.flush()
    }

    fn delete(&mut self, table: &str, id: u64) -> Result<(), VaultError> {
        self.inner.delete(table, id)?;
        self.flush()
    }

    fn tables(&self) -> Vec<String> {
        self.inner.tables()
    }
}
