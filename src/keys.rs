//! Session key derivation and ownership.
//!
//! This module owns two responsibilities:
//! 1. Stretching a user secret (PIN or passkey assertion) into the 256-bit
//!    session key with PBKDF2-HMAC-SHA256.
//! 2. Holding the derived key in a type that is opaque, non-cloneable, and
//!    zeroised on drop.
//!
//! This is one of exactly two modules permitted to import `ring` directly
//! (the other is `crypto`). The derivation logic lives here because it
//! operates on key material itself, not on ciphertexts.
//!
//! ## Derivation structure
//!
//! ```text
//! PBKDF2-HMAC-SHA256(
//!     secret     = PIN bytes | assertion bytes,
//!     salt       = 16-byte device salt,
//!     iterations = 310,000
//! ) -> 32-byte session key
//! ```
//!
//! The same `(secret, salt)` pair always yields the same key; determinism
//! is what keeps the vault decryptable across sessions. The salt is
//! created once per device and never changes — replacing it would silently
//! orphan every existing ciphertext.

use std::num::NonZeroU32;

use ring::{constant_time, digest, pbkdf2};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{KEY_LEN, SALT_LEN};

/// PBKDF2 iteration count. Deliberately slow; tuned to the same value the
/// original deployment used, above the 300k floor recommended for SHA-256.
const PBKDF2_ITERATIONS: u32 = 310_000;

/// Size of a SHA-256 PIN digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// The ephemeral data-encryption key for one unlocked session.
///
/// - Not `Clone`. Exactly one lives per session, owned by the gate.
/// - Zeroised on drop. Memory is overwritten before deallocation.
/// - Never persisted; raw bytes never leave the crate.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: [u8; KEY_LEN],
}

impl SessionKey {
    /// Borrow the raw key bytes for use in encrypt/decrypt operations.
    ///
    /// `pub(crate)` — raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("SessionKey(..)")
    }
}

/// Stretch a user secret into a session key.
///
/// This call is CPU-bound by design (hundreds of milliseconds on typical
/// hardware). It never fails: weak or short secrets still produce a key —
/// secret policy is the gate's concern, not this layer's.
pub fn derive_session_key(secret: &[u8], salt: &[u8; SALT_LEN]) -> SessionKey {
    let mut bytes = [0u8; KEY_LEN];
    // `NonZeroU32::new` only fails for zero; the constant is non-zero.
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS).unwrap();
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        secret,
        &mut bytes,
    );
    SessionKey { bytes }
}

/// Derive a session key from a passkey assertion.
///
/// The assertion bytes go through the same PBKDF2 primitive and device
/// salt as PIN-derived keys, so both unlock methods share one derivation
/// path.
pub fn session_key_from_assertion(assertion: &[u8], salt: &[u8; SALT_LEN]) -> SessionKey {
    derive_session_key(assertion, salt)
}

/// SHA-256 digest of a PIN, for credential storage and comparison.
///
/// This digest gates *unlock attempts* only; it is persisted outside the
/// vault and is not key material (the session key comes from PBKDF2).
pub fn pin_digest(pin: &str) -> [u8; DIGEST_LEN] {
    let hash = digest::digest(&digest::SHA256, pin.as_bytes());
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(hash.as_ref());
    out
}

/// Constant-time digest comparison.
pub(crate) fn digests_match(a: &[u8; DIGEST_LEN], b: &[u8; DIGEST_LEN]) -> bool {
    constant_time::verify_slices_are_equal(a, b).is_ok()
}
