//! # vitavault
//!
//! Encrypted vault and session-key security gate for a local-first
//! personal health tracker.
//!
//! Records (symptoms, vitals, medication, habits) are sealed with
//! AES-256-GCM under an ephemeral session key that exists only while the
//! vault is unlocked. The key is stretched from a user secret (PIN or
//! passkey assertion) with PBKDF2-HMAC-SHA256 and destroyed on lock —
//! explicit, idle-timeout, or process exit. Every sensitive operation
//! leaves an entry in an encrypted, append-only audit trail.
//!
//! The threat model is data at rest on this device. A lost PIN with no
//! passkey is unrecoverable by design; there is no escrow and no sync.
//!
//! ## Public API
//!
//! The public surface is intentionally narrow: the [`Vault`] facade, the
//! collaborator traits it is built over ([`TableStore`](store::TableStore),
//! [`CredentialStore`](platform::CredentialStore),
//! [`Authenticator`](platform::Authenticator)), and the record/audit
//! types. Key material never leaves the crate.
//!
//! ```no_run
//! use vitavault::platform::MemoryCredentialStore;
//! use vitavault::records::WeightEntry;
//! use vitavault::store::MemoryStore;
//! use vitavault::{LockReason, Vault};
//!
//! # fn main() -> Result<(), vitavault::VaultError> {
//! let mut vault = Vault::new(
//!     Box::new(MemoryStore::new()),
//!     Box::new(MemoryCredentialStore::new()),
//! );
//!
//! vault.unlock_with_pin("4242")?; // first unlock sets the PIN
//! vault.add_record(&WeightEntry {
//!     timestamp: chrono::Utc::now(),
//!     value: 81.5,
//! })?;
//! let latest: Option<WeightEntry> = vault.latest_record()?;
//! vault.lock(LockReason::Manual);
//! # let _ = latest;
//! # Ok(())
//! # }
//! ```

// Module declarations.
pub(crate) mod crypto;
pub mod error;
pub(crate) mod keys;
pub mod audit;
pub mod gate;
pub mod platform;
pub mod records;
pub mod store;
pub mod vault;

pub use audit::{AuditAction, AuditEntry, ExportKind, LockReason, UnlockMethod};
pub use error::VaultError;
pub use gate::{GateState, StateListener};
pub use keys::SessionKey;
pub use vault::{Snapshot, Vault};
