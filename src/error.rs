//! Error types for vitavault.
//!
//! Every variant is a distinct failure mode of the vault. Messages are
//! intentionally minimal — they signal *what* failed without revealing
//! *why* in ways that could leak cryptographic state (a wrong PIN, a
//! tampered ciphertext, and a corrupted row all surface the same way at
//! the decryption boundary).

use std::fmt;

/// The single error type for all vitavault operations.
#[derive(Debug)]
pub enum VaultError {
    /// An operation required an active session key but the vault is locked.
    /// Recoverable by prompting the user to unlock.
    Locked,

    /// The supplied secret or assertion did not match the stored credential.
    AuthenticationFailure,

    /// A new PIN was shorter than the four-character minimum.
    PinTooShort,

    /// A passkey unlock was attempted with no enrolled passkey credential.
    PasskeyNotEnrolled,

    /// Encryption failed. The underlying `ring` operation returned an error.
    EncryptionFailure,

    /// Decryption failed. This includes: wrong key, tampered ciphertext,
    /// or corrupted GCM authentication tag. Indistinguishable by contract.
    DecryptionFailure,

    /// A stored row does not have the expected `{iv, ciphertext}` shape.
    /// Absorbed (skipped) during table reads, never fatal to a batch.
    MalformedRecord,

    /// Key derivation failed.
    KeyDerivationFailure,

    /// The system's random number generator failed to produce bytes.
    RandomnessFailure,

    /// The durable storage collaborator failed. Propagated unchanged.
    Storage(String),

    /// A payload could not be serialized or deserialized.
    Serialization(String),

    /// No backup exists for the requested date.
    BackupNotFound(String),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "vault locked, unlock required"),
            Self::AuthenticationFailure => write!(f, "authentication failed"),
            Self::PinTooShort => write!(f, "pin must be at least 4 characters"),
            Self::PasskeyNotEnrolled => write!(f, "no passkey enrolled"),
            Self::EncryptionFailure => write!(f, "encryption failed"),
            Self::DecryptionFailure => write!(f, "decryption failed"),
            Self::MalformedRecord => write!(f, "malformed record"),
            Self::KeyDerivationFailure => write!(f, "key derivation failed"),
            Self::RandomnessFailure => write!(f, "randomness source failed"),
            Self::Storage(reason) => write!(f, "storage failure: {}", reason),
            Self::Serialization(reason) => write!(f, "serialization failure: {}", reason),
            Self::BackupNotFound(date) => write!(f, "no backup found for: {}", date),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
