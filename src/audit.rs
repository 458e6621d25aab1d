//! Encrypted, append-only audit trail.
//!
//! Every sensitive operation appends one entry to a dedicated table,
//! sealed under the same session key as any other record. The trail is
//! append-only from the application's perspective: nothing in this crate
//! updates or deletes an entry, and only a full vault reset clears the
//! table (the reset itself is the one unauditable action, by necessity —
//! it destroys the table that would record it).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, Encrypted};
use crate::error::VaultError;
use crate::keys::SessionKey;
use crate::store::TableStore;

/// Table holding the encrypted audit trail.
pub const AUDIT_TABLE: &str = "audit_logs";

/// The single local identity recorded on every entry.
pub const LOCAL_USER: &str = "local-user";

/// How a session was unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlockMethod {
    Pin,
    Passkey,
}

/// Why a session was locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockReason {
    Manual,
    IdleTimeout,
}

/// Export format, recorded with the `EXPORT` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportKind {
    Json,
    Pdf,
}

/// A sensitive action and its structured metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login { method: UnlockMethod },
    Logout { reason: LockReason },
    Export { kind: ExportKind },
    Add { table: String, id: u64 },
    ReadOne { table: String, id: u64 },
    ReadAll { table: String, count: usize },
    ReadLatest { table: String },
}

/// One decrypted trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user: String,
    #[serde(flatten)]
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
}

/// Append one entry to the trail.
///
/// Uses the same sealed-row path as every other table, but never audits
/// its own write. Callers must hold the session key: the trail's
/// "silent no-op while locked" behavior lives at the facade, which simply
/// does not call this without a key.
pub(crate) fn record(
    store: &mut dyn TableStore,
    key: &SessionKey,
    action: AuditAction,
) -> Result<(), VaultError> {
    let entry = AuditEntry {
        user: LOCAL_USER.to_string(),
        action,
        timestamp: Utc::now(),
    };
    let plaintext = serde_json::to_vec(&entry)?;
    let sealed = crypto::encrypt(key.as_bytes(), &plaintext)?;
    store.put(AUDIT_TABLE, serde_json::to_value(&sealed)?)?;
    Ok(())
}

/// Decrypt the whole trail, newest first.
///
/// Rows that fail to decrypt or lack the sealed-row shape are dropped,
/// mirroring the table-read policy.
pub(crate) fn read_all(
    store: &dyn TableStore,
    key: &SessionKey,
) -> Result<Vec<AuditEntry>, VaultError> {
    let mut entries = Vec::new();
    for row in store.to_array(AUDIT_TABLE)? {
        let sealed: Encrypted = match serde_json::from_value(row.encrypted) {
            Ok(sealed) => sealed,
            Err(_) => {
                tracing::warn!(table = AUDIT_TABLE, id = row.id, "skipping malformed audit row");
                continue;
            }
        };
        let plaintext = match crypto::decrypt(key.as_bytes(), &sealed) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                tracing::warn!(table = AUDIT_TABLE, id = row.id, "skipping undecryptable audit row");
                continue;
            }
        };
        match serde_json::from_slice::<AuditEntry>(&plaintext) {
            Ok(entry) => entries.push(entry),
            Err(_) => {
                tracing::warn!(table = AUDIT_TABLE, id = row.id, "skipping unparsable audit entry");
            }
        }
    }
    // Newest first; entries appended later win timestamp ties.
    entries.reverse();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(entries)
}
