//! Platform collaborators: credential storage and the passkey authenticator.
//!
//! The credential record lives *outside* the vault, in plaintext, because
//! it must be readable while the vault is locked: the stored PIN digest is
//! what an unlock attempt is checked against, and the device salt is an
//! input to key derivation. Neither is key material on its own.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::SALT_LEN;
use crate::error::VaultError;
use crate::keys::DIGEST_LEN;

/// The persistent unlock credential, created trust-on-first-use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// SHA-256 digest of the PIN. Not key material.
    pub pin_hash: [u8; DIGEST_LEN],
    /// Device salt for key derivation. Immutable once set: changing it
    /// would make every previously derived key diverge and orphan all
    /// existing ciphertexts.
    pub device_salt: [u8; SALT_LEN],
    /// Platform credential id, present after passkey enrollment.
    pub passkey_credential_id: Option<Vec<u8>>,
}

/// Plaintext secret storage readable while the vault is locked.
pub trait CredentialStore: Send {
    fn load(&self) -> Result<Option<Credential>, VaultError>;
    fn save(&mut self, credential: &Credential) -> Result<(), VaultError>;
}

/// A platform authenticator (WebAuthn, OS keychain, hardware token).
///
/// The gate treats it as opaque: enrollment yields a stable credential id,
/// and an assertion yields a stable byte sequence to stretch into a key.
pub trait Authenticator {
    /// Enroll a new platform credential, returning its id.
    fn create_credential(&mut self) -> Result<Vec<u8>, VaultError>;

    /// Obtain an assertion for a previously enrolled credential. Fails
    /// when the user cancels or verification fails.
    fn get_assertion(&mut self, credential_id: &[u8]) -> Result<Vec<u8>, VaultError>;
}

// ---------------------------------------------------------------------------
// In-memory credential store
// ---------------------------------------------------------------------------

/// Volatile credential store, primarily for tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Option<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>, VaultError> {
        Ok(self.credential.clone())
    }

    fn save(&mut self, credential: &Credential) -> Result<(), VaultError> {
        self.credential = Some(credential.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed credential store
// ---------------------------------------------------------------------------

/// Credential record serialized as a small JSON file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, VaultError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&mut self, credential: &Credential) -> Result<(), VaultError> {
        let raw = serde_json::to_string(credential)?;
        fs::write(&self.path, raw).map_err(|e| VaultError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credential.json");

        let mut store = FileCredentialStore::new(&path);
        assert!(store.load().unwrap().is_none());

        let credential = Credential {
            pin_hash: [1u8; DIGEST_LEN],
            device_salt: [2u8; SALT_LEN],
            passkey_credential_id: Some(vec![3, 4, 5]),
        };
        store.save(&credential).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.pin_hash, credential.pin_hash);
        assert_eq!(loaded.device_salt, credential.device_salt);
        assert_eq!(loaded.passkey_credential_id, Some(vec![3, 4, 5]));
    }
}
