//! The lock is the access-control enforcement point: with no active
//! session key, no table operation may touch storage or the audit trail.

use vitavault::platform::MemoryCredentialStore;
use vitavault::store::MemoryStore;
use vitavault::{AuditAction, Vault, VaultError};

fn locked_vault() -> Vault {
    Vault::new(
        Box::new(MemoryStore::new()),
        Box::new(MemoryCredentialStore::new()),
    )
}

#[test]
fn test_locked_vault_rejects_all_operations() {
    let mut vault = locked_vault();

    assert!(matches!(
        vault.put("weight", &serde_json::json!({ "value": 80 })),
        Err(VaultError::Locked)
    ));
    assert!(matches!(vault.get("weight", 1), Err(VaultError::Locked)));
    assert!(matches!(vault.get_all("weight"), Err(VaultError::Locked)));
    assert!(matches!(vault.get_latest("weight"), Err(VaultError::Locked)));
    assert!(matches!(
        vault.export_all(vitavault::ExportKind::Json),
        Err(VaultError::Locked)
    ));
    assert!(matches!(vault.read_audit(), Err(VaultError::Locked)));
    assert!(matches!(vault.create_backup(), Err(VaultError::Locked)));
    assert!(matches!(vault.reset(), Err(VaultError::Locked)));
}

#[test]
fn test_rejected_write_leaves_no_row_and_no_audit_entry() {
    let mut vault = locked_vault();

    let denied = vault.put("calories", &serde_json::json!({ "value": 500 }));
    assert!(matches!(denied, Err(VaultError::Locked)));

    // Unlock and inspect: the denied write left nothing behind.
    vault.unlock_with_pin("4242").unwrap();
    assert!(vault.get_all("calories").unwrap().is_empty());

    let trail = vault.read_audit().unwrap();
    // Only the LOGIN and the READ_ALL above; nothing from the denied put.
    assert!(!trail
        .iter()
        .any(|e| matches!(e.action, AuditAction::Add { .. })));
}

#[test]
fn test_relock_collapses_access_again() {
    let mut vault = locked_vault();
    vault.unlock_with_pin("4242").unwrap();
    vault
        .put("sleep", &serde_json::json!({ "hours": 7.5 }))
        .unwrap();

    vault.lock(vitavault::LockReason::Manual);
    assert!(!vault.is_unlocked());
    assert!(matches!(vault.get_all("sleep"), Err(VaultError::Locked)));

    // The data is still there after a fresh unlock.
    vault.unlock_with_pin("4242").unwrap();
    assert_eq!(vault.get_all("sleep").unwrap().len(), 1);
}
