//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that import `ring`
//! directly (the other is `keys`). All other modules perform encryption and
//! decryption exclusively through the functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM (authenticated encryption)
//! - **IV**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)

use ring::aead::{self, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// The AEAD algorithm used throughout the vault.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the IV in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Size of a session key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of the device salt in bytes.
pub const SALT_LEN: usize = 16;

/// A single sealed payload as it is persisted: the per-call IV alongside
/// the ciphertext (which carries the GCM tag at its end).
///
/// The IV is stored as an explicit field rather than prepended to the
/// ciphertext so that a stored row is self-describing: a row whose
/// `encrypted` value does not deserialize to this shape is a
/// malformed/legacy record and is skipped on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encrypted {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

/// Generate a cryptographically random IV for a single encryption call.
///
/// Uses `ring::rand::SystemRandom`, the only source of randomness in the
/// crate. There is no IV caching or counter-based generation, and no code
/// path accepts a caller-supplied IV.
fn generate_iv() -> Result<[u8; IV_LEN], VaultError> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; IV_LEN];
    rng.fill(&mut buf).map_err(|_| VaultError::RandomnessFailure)?;
    Ok(buf)
}

/// Generate a random device salt for key derivation.
pub fn generate_salt() -> Result<[u8; SALT_LEN], VaultError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| VaultError::RandomnessFailure)?;
    Ok(salt)
}

/// Encrypt a plaintext payload using AES-256-GCM under a fresh IV.
pub fn encrypt(key_bytes: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Encrypted, VaultError> {
    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| VaultError::EncryptionFailure)?;
    let key = LessSafeKey::new(unbound);

    let iv = generate_iv()?;
    let nonce = Nonce::assume_unique_for_key(iv);
    let aad = aead::Aad::empty();

    let mut ciphertext = Vec::with_capacity(plaintext.len() + ALGORITHM.tag_len());
    ciphertext.extend_from_slice(plaintext);

    // `seal_in_place_append_tag` encrypts in place and appends the GCM tag.
    key.seal_in_place_append_tag(nonce, aad, &mut ciphertext)
        .map_err(|_| VaultError::EncryptionFailure)?;

    Ok(Encrypted { iv, ciphertext })
}

/// Decrypt a sealed payload using AES-256-GCM.
///
/// Fails closed: a wrong key, tampered ciphertext, and a structurally
/// invalid input all return `DecryptionFailure`. The caller receives no
/// partial plaintext.
pub fn decrypt(key_bytes: &[u8; KEY_LEN], sealed: &Encrypted) -> Result<Vec<u8>, VaultError> {
    if sealed.ciphertext.len() < ALGORITHM.tag_len() {
        return Err(VaultError::DecryptionFailure);
    }

    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| VaultError::DecryptionFailure)?;
    let key = LessSafeKey::new(unbound);

    let nonce = Nonce::assume_unique_for_key(sealed.iv);
    let aad = aead::Aad::empty();

    let mut payload = sealed.ciphertext.clone();
    let plaintext = key
        .open_in_place(nonce, aad, &mut payload)
        .map_err(|_| VaultError::DecryptionFailure)?;

    Ok(plaintext.to_vec())
}
