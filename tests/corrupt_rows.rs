//! Data-quality policy: a malformed or undecryptable row is skipped with
//! a warning, never allowed to fail the rest of its table.

use std::sync::{Arc, Mutex};

use serde_json::json;
use vitavault::error::VaultError;
use vitavault::platform::MemoryCredentialStore;
use vitavault::store::{MemoryStore, StoredRow, TableStore};
use vitavault::Vault;

/// A store handle two vaults can share, so a test can observe rows one
/// vault sealed from another vault's side.
#[derive(Clone)]
struct SharedStore(Arc<Mutex<MemoryStore>>);

impl SharedStore {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(MemoryStore::new())))
    }
}

impl TableStore for SharedStore {
    fn put(&mut self, table: &str, encrypted: serde_json::Value) -> Result<u64, VaultError> {
        self.0.lock().unwrap().put(table, encrypted)
    }
    fn get(&self, table: &str, id: u64) -> Result<Option<StoredRow>, VaultError> {
        self.0.lock().unwrap().get(table, id)
    }
    fn to_array(&self, table: &str) -> Result<Vec<StoredRow>, VaultError> {
        self.0.lock().unwrap().to_array(table)
    }
    fn update(
        &mut self,
        table: &str,
        id: u64,
        encrypted: serde_json::Value,
    ) -> Result<(), VaultError> {
        self.0.lock().unwrap().update(table, id, encrypted)
    }
    fn clear(&mut self, table: &str) -> Result<(), VaultError> {
        self.0.lock().unwrap().clear(table)
    }
    fn delete(&mut self, table: &str, id: u64) -> Result<(), VaultError> {
        self.0.lock().unwrap().delete(table, id)
    }
    fn tables(&self) -> Vec<String> {
        self.0.lock().unwrap().tables()
    }
}

#[test]
fn test_malformed_rows_are_skipped_not_fatal() {
    // Seed the collaborator with two rows that predate encryption (or were
    // corrupted in storage): neither has a valid {iv, ciphertext} shape.
    let mut store = MemoryStore::new();
    store
        .put("calories", json!({ "value": 500, "legacy": true }))
        .unwrap();
    store.put("calories", json!("not even an object")).unwrap();

    let mut vault = Vault::new(Box::new(store), Box::new(MemoryCredentialStore::new()));
    vault.unlock_with_pin("4242").unwrap();

    for value in [100u32, 200, 300, 400, 500] {
        vault
            .put(
                "calories",
                &json!({ "value": value, "timestamp": "2025-03-01T10:00:00Z" }),
            )
            .unwrap();
    }

    // 5 valid + 2 malformed rows: exactly the 5 valid payloads come back.
    let all = vault.get_all("calories").unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|v| v.get("legacy").is_none()));
}

#[test]
fn test_rows_sealed_under_a_lost_key_are_skipped() {
    // Two vaults over the same storage but separate credential stores:
    // each first unlock draws its own device salt, so the same PIN still
    // derives two different keys. Rows sealed by the first vault are
    // unreadable orphans to the second, and must be skipped, not fatal.
    let store = SharedStore::new();

    let mut old_vault = Vault::new(
        Box::new(store.clone()),
        Box::new(MemoryCredentialStore::new()),
    );
    old_vault.unlock_with_pin("4242").unwrap();
    old_vault.put("sleep", &json!({ "hours": 6 })).unwrap();

    let mut vault = Vault::new(Box::new(store), Box::new(MemoryCredentialStore::new()));
    vault.unlock_with_pin("4242").unwrap();
    vault.put("sleep", &json!({ "hours": 8 })).unwrap();

    let all = vault.get_all("sleep").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["hours"], 8);
}

#[test]
fn test_fully_corrupt_table_reads_empty() {
    let mut store = MemoryStore::new();
    store.put("weight", json!({ "garbage": 1 })).unwrap();
    store.put("weight", json!(null)).unwrap();

    let mut vault = Vault::new(Box::new(store), Box::new(MemoryCredentialStore::new()));
    vault.unlock_with_pin("4242").unwrap();

    assert!(vault.get_all("weight").unwrap().is_empty());
    assert!(vault.get_latest("weight").unwrap().is_none());
}
