//! The vault facade.
//!
//! One struct owns the three moving parts: the gate (session key
//! lifecycle), the storage collaborator (sealed rows), and the audit
//! policy (what gets recorded, and when). Every data path runs through
//! here, which is what makes the two core guarantees structural:
//!
//! - No operation touches a table without an active session key.
//! - No successful sensitive operation goes unaudited, and the audit
//!   entry is written only after the primary effect is durable.
//!
//! Audit writes are best-effort: a failed trail append is logged but
//! never masks the outcome of the operation it describes.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditAction, AuditEntry, ExportKind, LockReason, UnlockMethod, AUDIT_TABLE};
use crate::crypto::{self, Encrypted};
use crate::error::VaultError;
use crate::gate::{Gate, GateState, StateListener, DEFAULT_IDLE_TIMEOUT};
use crate::keys::SessionKey;
use crate::platform::{Authenticator, CredentialStore};
use crate::records::TrackerRecord;
use crate::store::{StoredRow, TableStore};

/// Table holding encrypted backup snapshots.
const BACKUP_TABLE: &str = "backups";

/// How many backup snapshots to retain.
const BACKUP_KEEP: usize = 3;

/// A decrypted, per-table snapshot of vault contents.
pub type Snapshot = BTreeMap<String, Vec<serde_json::Value>>;

/// Why a row was left out of a table read. Skips are absorbed at the
/// read boundary by policy: one corrupted row must not make the rest of
/// its table inaccessible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    /// The row's `encrypted` value is not a valid `{iv, ciphertext}` shape.
    Malformed,
    /// Authenticated decryption failed (wrong key or tampered data).
    Undecryptable,
}

/// Per-row read outcome, before the boundary drops the skips.
enum RowOutcome {
    Ok(serde_json::Value),
    Skipped(SkipReason),
}

fn open_row(key: &SessionKey, row: &StoredRow) -> RowOutcome {
    let sealed: Encrypted = match serde_json::from_value(row.encrypted.clone()) {
        Ok(sealed) => sealed,
        Err(_) => return RowOutcome::Skipped(SkipReason::Malformed),
    };
    let plaintext = match crypto::decrypt(key.as_bytes(), &sealed) {
        Ok(plaintext) => plaintext,
        Err(_) => return RowOutcome::Skipped(SkipReason::Undecryptable),
    };
    match serde_json::from_slice(&plaintext) {
        Ok(value) => RowOutcome::Ok(value),
        Err(_) => RowOutcome::Skipped(SkipReason::Malformed),
    }
}

/// One encrypted backup snapshot, itself stored as a sealed row.
#[derive(Debug, Serialize, Deserialize)]
struct BackupRecord {
    date: String,
    created: DateTime<Utc>,
    data: Snapshot,
}

/// The encrypted vault: gate, storage, and audit trail behind one surface.
pub struct Vault {
    store: Box<dyn TableStore>,
    gate: Gate,
}

impl Vault {
    /// Build a vault over a storage collaborator and a credential store,
    /// with the default 10-minute idle window.
    pub fn new(store: Box<dyn TableStore>, credentials: Box<dyn CredentialStore>) -> Self {
        Self::with_idle_timeout(store, credentials, DEFAULT_IDLE_TIMEOUT)
    }

    /// Build a vault with an explicit idle window.
    pub fn with_idle_timeout(
        store: Box<dyn TableStore>,
        credentials: Box<dyn CredentialStore>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gate: Gate::new(credentials, idle_timeout),
        }
    }

    // -----------------------------------------------------------------
    // Gate surface
    // -----------------------------------------------------------------

    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    pub fn is_unlocked(&self) -> bool {
        self.gate.is_unlocked()
    }

    /// Register a listener for lock/unlock transitions.
    pub fn on_state_change(&mut self, listener: Box<dyn StateListener>) {
        self.gate.add_listener(listener);
    }

    /// Unlock with a PIN (trust-on-first-use for the first ever unlock).
    pub fn unlock_with_pin(&mut self, pin: &str) -> Result<(), VaultError> {
        self.gate.unlock_with_pin(pin)?;
        self.audit_best_effort(AuditAction::Login {
            method: UnlockMethod::Pin,
        });
        Ok(())
    }

    /// Unlock with an enrolled passkey.
    pub fn unlock_with_passkey(
        &mut self,
        authenticator: &mut dyn Authenticator,
    ) -> Result<(), VaultError> {
        self.gate.unlock_with_passkey(authenticator)?;
        self.audit_best_effort(AuditAction::Login {
            method: UnlockMethod::Passkey,
        });
        Ok(())
    }

    /// Enroll a passkey as an alternative unlock method. Requires an
    /// unlocked session.
    pub fn enroll_passkey(
        &mut self,
        authenticator: &mut dyn Authenticator,
    ) -> Result<(), VaultError> {
        self.ensure_active()?;
        self.gate.enroll_passkey(authenticator)
    }

    /// Lock the vault. The `LOGOUT` entry is sealed strictly before the
    /// key is destroyed; once this returns, the key is gone. A no-op when
    /// already locked.
    pub fn lock(&mut self, reason: LockReason) {
        if let Some(key) = self.gate.take_key() {
            if let Err(err) = audit::record(
                self.store.as_mut(),
                &key,
                AuditAction::Logout { reason },
            ) {
                tracing::warn!(error = %err, "failed to record logout in audit trail");
            }
            drop(key);
            self.gate.notify_locked();
        }
    }

    /// Forwarded user activity (pointer/keyboard/touch). Resets the idle
    /// window; if the window already elapsed, the session locks instead.
    pub fn notify_activity(&mut self) {
        self.expire_if_idle();
        self.gate.notify_activity();
    }

    /// Evaluate the idle window now, locking if it has elapsed.
    pub fn check_idle(&mut self) -> GateState {
        self.expire_if_idle();
        self.gate.state()
    }

    /// Change the PIN, re-sealing every stored row under the new key so
    /// existing records stay readable. Requires an unlocked session.
    pub fn change_pin(&mut self, current: &str, new: &str) -> Result<(), VaultError> {
        self.ensure_active()?;
        self.gate.verify_pin(current)?;
        let new_key = self.gate.derive_key_for_pin(new)?;

        // Re-seal phase: build replacements for every row that decrypts
        // under the live key. Rows that were already unreadable are left
        // untouched rather than dropped.
        let mut replacements: Vec<(String, u64, serde_json::Value)> = Vec::new();
        {
            let key = self.gate.session_key().ok_or(VaultError::Locked)?;
            for table in self.store.tables() {
                for row in self.store.to_array(&table)? {
                    let sealed: Encrypted = match serde_json::from_value(row.encrypted.clone()) {
                        Ok(sealed) => sealed,
                        Err(_) => continue,
                    };
                    let plaintext = match crypto::decrypt(key.as_bytes(), &sealed) {
                        Ok(plaintext) => plaintext,
                        Err(_) => continue,
                    };
                    let resealed = crypto::encrypt(new_key.as_bytes(), &plaintext)?;
                    replacements.push((table.clone(), row.id, serde_json::to_value(&resealed)?));
                }
            }
        }
        for (table, id, encrypted) in replacements {
            self.store.update(&table, id, encrypted)?;
        }

        self.gate.set_pin(new)?;
        self.gate.replace_key(new_key);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Table operations
    // -----------------------------------------------------------------

    /// Seal a payload into a table, returning the storage-assigned id.
    /// Audits `ADD{table, id}` after the row is durable.
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        table: &str,
        payload: &T,
    ) -> Result<u64, VaultError> {
        self.ensure_active()?;
        let key = self.gate.session_key().ok_or(VaultError::Locked)?;
        let plaintext = serde_json::to_vec(payload)?;
        let sealed = crypto::encrypt(key.as_bytes(), &plaintext)?;
        let id = self.store.put(table, serde_json::to_value(&sealed)?)?;
        self.audit_best_effort(AuditAction::Add {
            table: table.to_string(),
            id,
        });
        Ok(id)
    }

    /// Fetch and open a single row. Audits `READ_ONE` only when the row
    /// exists and decrypts.
    pub fn get(&mut self, table: &str, id: u64) -> Result<Option<serde_json::Value>, VaultError> {
        self.ensure_active()?;
        let key = self.gate.session_key().ok_or(VaultError::Locked)?;
        let row = match self.store.get(table, id)? {
            Some(row) => row,
            None => return Ok(None),
        };
        match open_row(key, &row) {
            RowOutcome::Ok(value) => {
                self.audit_best_effort(AuditAction::ReadOne {
                    table: table.to_string(),
                    id,
                });
                Ok(Some(value))
            }
            RowOutcome::Skipped(reason) => {
                tracing::warn!(table, id, ?reason, "skipping unreadable row");
                Ok(None)
            }
        }
    }

    /// Open every row of a table, in storage order. Rows that fail to
    /// open are dropped with a warning; a single corrupted row never
    /// fails the batch. Audits `READ_ALL{table, count}`.
    pub fn get_all(&mut self, table: &str) -> Result<Vec<serde_json::Value>, VaultError> {
        self.ensure_active()?;
        let values = self.open_table(table)?;
        self.audit_best_effort(AuditAction::ReadAll {
            table: table.to_string(),
            count: values.len(),
        });
        Ok(values)
    }

    /// Open every row and select the one with the maximum `timestamp`
    /// field. `None` on an empty or fully-corrupt table. O(n) per call by
    /// design; fine at personal-tracker volumes. Audits `READ_LATEST`
    /// when a record is found.
    pub fn get_latest(&mut self, table: &str) -> Result<Option<serde_json::Value>, VaultError> {
        self.ensure_active()?;
        let values = self.open_table(table)?;
        let latest = values
            .into_iter()
            .max_by_key(|value| payload_timestamp(value).unwrap_or(DateTime::UNIX_EPOCH));
        if latest.is_some() {
            self.audit_best_effort(AuditAction::ReadLatest {
                table: table.to_string(),
            });
        }
        Ok(latest)
    }

    /// Decrypted snapshot of every data table (the audit trail is not
    /// exported). Audits exactly one `EXPORT{kind}` entry.
    pub fn export_all(&mut self, kind: ExportKind) -> Result<Snapshot, VaultError> {
        self.ensure_active()?;
        let mut snapshot = Snapshot::new();
        for table in self.store.tables() {
            if table == AUDIT_TABLE {
                continue;
            }
            snapshot.insert(table.clone(), self.open_table(&table)?);
        }
        self.audit_best_effort(AuditAction::Export { kind });
        Ok(snapshot)
    }

    /// Replace data-table contents from a snapshot, re-sealing every
    /// payload under the current key. Rows imported this way are not
    /// individually audited; the import replaces table contents wholesale.
    pub fn import_all(&mut self, snapshot: &Snapshot) -> Result<(), VaultError> {
        self.ensure_active()?;
        for (table, payloads) in snapshot {
            if table == AUDIT_TABLE {
                continue;
            }
            self.store.clear(table)?;
            for payload in payloads {
                self.put_unaudited(table, payload)?;
            }
        }
        Ok(())
    }

    /// Clear every table, audit trail included. The clearing of the trail
    /// is itself unauditable: the action destroys the table that would
    /// record it. Documented gap, not an oversight.
    pub fn reset(&mut self) -> Result<(), VaultError> {
        self.ensure_active()?;
        for table in self.store.tables() {
            self.store.clear(&table)?;
        }
        Ok(())
    }

    /// Decrypted audit trail, newest first.
    pub fn read_audit(&mut self) -> Result<Vec<AuditEntry>, VaultError> {
        self.ensure_active()?;
        let key = self.gate.session_key().ok_or(VaultError::Locked)?;
        audit::read_all(self.store.as_ref(), key)
    }

    // -----------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------

    /// Store an encrypted snapshot of every data table in the backup
    /// table, pruning to the most recent three. Returns the backup date.
    pub fn create_backup(&mut self) -> Result<String, VaultError> {
        self.ensure_active()?;
        let mut data = Snapshot::new();
        for table in self.store.tables() {
            if table == AUDIT_TABLE || table == BACKUP_TABLE {
                continue;
            }
            data.insert(table.clone(), self.open_table(&table)?);
        }

        let created = Utc::now();
        let record = BackupRecord {
            date: created.format("%Y-%m-%d").to_string(),
            created,
            data,
        };
        self.put_unaudited(BACKUP_TABLE, &record)?;
        self.prune_backups()?;
        Ok(record.date)
    }

    /// Dates of available backups, newest first.
    pub fn list_backups(&mut self) -> Result<Vec<String>, VaultError> {
        self.ensure_active()?;
        let mut backups = self.open_backups()?;
        backups.sort_by(|a, b| b.1.created.cmp(&a.1.created));
        Ok(backups.into_iter().map(|(_, b)| b.date).collect())
    }

    /// Restore data tables from the newest backup taken on `date`.
    pub fn restore_backup(&mut self, date: &str) -> Result<(), VaultError> {
        self.ensure_active()?;
        let backups = self.open_backups()?;
        let backup = backups
            .into_iter()
            .filter(|(_, b)| b.date == date)
            .max_by_key(|(_, b)| b.created)
            .ok_or_else(|| VaultError::BackupNotFound(date.to_string()))?
            .1;

        for (table, payloads) in &backup.data {
            self.store.clear(table)?;
            for payload in payloads {
                self.put_unaudited(table, payload)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------

    /// Add a typed tracker record to its table.
    pub fn add_record<T: TrackerRecord>(&mut self, record: &T) -> Result<u64, VaultError> {
        self.put(T::TABLE, record)
    }

    /// The most recent record of a category, by its `timestamp` field.
    pub fn latest_record<T: TrackerRecord>(&mut self) -> Result<Option<T>, VaultError> {
        match self.get_latest(T::TABLE)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// All records of a category, in storage order. Payloads that do not
    /// parse as `T` are dropped with a warning, same policy as rows that
    /// do not decrypt.
    pub fn all_records<T: TrackerRecord>(&mut self) -> Result<Vec<T>, VaultError> {
        let mut records = Vec::new();
        for value in self.get_all(T::TABLE)? {
            match serde_json::from_value(value) {
                Ok(record) => records.push(record),
                Err(_) => {
                    tracing::warn!(table = T::TABLE, "skipping payload with unexpected shape");
                }
            }
        }
        Ok(records)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Lazily apply the idle policy, then require an active key.
    ///
    /// Every public data operation starts here; nothing caches a key
    /// across calls, so a lock event is always observed by the next call.
    fn ensure_active(&mut self) -> Result<(), VaultError> {
        self.expire_if_idle();
        if self.gate.is_unlocked() {
            Ok(())
        } else {
            Err(VaultError::Locked)
        }
    }

    fn expire_if_idle(&mut self) {
        if self.gate.idle_expired() {
            if let Some(key) = self.gate.take_key() {
                if let Err(err) = audit::record(
                    self.store.as_mut(),
                    &key,
                    AuditAction::Logout {
                        reason: LockReason::IdleTimeout,
                    },
                ) {
                    tracing::warn!(error = %err, "failed to record idle logout in audit trail");
                }
            }
            self.gate.notify_locked();
            tracing::info!("session locked after idle timeout");
        }
    }

    fn audit_best_effort(&mut self, action: AuditAction) {
        // Silent no-op while locked: auditing never blocks, and never
        // reveals lock state to an observer of the call.
        if let Some(key) = self.gate.session_key() {
            if let Err(err) = audit::record(self.store.as_mut(), key, action) {
                tracing::warn!(error = %err, "failed to append audit entry");
            }
        }
    }

    /// Open every row of a table, dropping skips with a warning.
    fn open_table(&self, table: &str) -> Result<Vec<serde_json::Value>, VaultError> {
        let key = self.gate.session_key().ok_or(VaultError::Locked)?;
        let mut values = Vec::new();
        for row in self.store.to_array(table)? {
            match open_row(key, &row) {
                RowOutcome::Ok(value) => values.push(value),
                RowOutcome::Skipped(reason) => {
                    tracing::warn!(table, id = row.id, ?reason, "skipping unreadable row");
                }
            }
        }
        Ok(values)
    }

    /// Seal and store without an `ADD` audit entry. Used by bulk paths
    /// (backup, import, restore) where per-row entries would be noise.
    fn put_unaudited<T: Serialize + ?Sized>(
        &mut self,
        table: &str,
        payload: &T,
    ) -> Result<u64, VaultError> {
        let key = self.gate.session_key().ok_or(VaultError::Locked)?;
        let plaintext = serde_json::to_vec(payload)?;
        let sealed = crypto::encrypt(key.as_bytes(), &plaintext)?;
        self.store.put(table, serde_json::to_value(&sealed)?)
    }

    fn open_backups(&self) -> Result<Vec<(u64, BackupRecord)>, VaultError> {
        let key = self.gate.session_key().ok_or(VaultError::Locked)?;
        let mut backups = Vec::new();
        for row in self.store.to_array(BACKUP_TABLE)? {
            match open_row(key, &row) {
                RowOutcome::Ok(value) => match serde_json::from_value(value) {
                    Ok(record) => backups.push((row.id, record)),
                    Err(_) => {
                        tracing::warn!(id = row.id, "skipping backup row with unexpected shape");
                    }
                },
                RowOutcome::Skipped(reason) => {
                    tracing::warn!(id = row.id, ?reason, "skipping unreadable backup row");
                }
            }
        }
        Ok(backups)
    }

    fn prune_backups(&mut self) -> Result<(), VaultError> {
        let mut backups = self.open_backups()?;
        if backups.len() <= BACKUP_KEEP {
            return Ok(());
        }
        // Oldest first; delete until only the retention window remains.
        backups.sort_by(|a, b| a.1.created.cmp(&b.1.created));
        let excess = backups.len() - BACKUP_KEEP;
        for (id, _) in backups.into_iter().take(excess) {
            self.store.delete(BACKUP_TABLE, id)?;
        }
        Ok(())
    }
}

/// Read the `timestamp` field of a decrypted payload, when present and
/// RFC 3339-parsable.
fn payload_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    value
        .get("timestamp")?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
