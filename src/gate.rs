//! The security gate: authentication state machine and idle policy.
//!
//! The gate is the exclusive owner of the session key. It creates the key
//! on a successful unlock, hands out short-lived borrows to the facade,
//! and destroys it on lock. No other component may extend the key's
//! lifetime; every vault call re-checks key presence through the gate
//! rather than caching a reference captured earlier.
//!
//! Unlock is trust-on-first-use: with no stored credential, any PIN of at
//! least four characters becomes the credential. The idle window is
//! evaluated lazily — expiry is observed at the next vault call rather
//! than by a background timer, which keeps the crate single-threaded and
//! makes lock ordering deterministic.

use std::time::{Duration, Instant};

use crate::crypto;
use crate::error::VaultError;
use crate::keys::{self, SessionKey};
use crate::platform::{Authenticator, Credential, CredentialStore};

/// Minimum PIN length, in characters.
pub const MIN_PIN_LEN: usize = 4;

/// Default idle window before auto-lock.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Observable gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocked,
}

/// Receives gate state transitions. Replaces ambient globals: UI layers
/// register a listener instead of reaching into shared mutable state.
pub trait StateListener: Send {
    fn on_state_change(&mut self, state: GateState);
}

/// The authentication gate.
pub struct Gate {
    credentials: Box<dyn CredentialStore>,
    key: Option<SessionKey>,
    idle_timeout: Duration,
    last_activity: Instant,
    listeners: Vec<Box<dyn StateListener>>,
}

impl Gate {
    pub(crate) fn new(credentials: Box<dyn CredentialStore>, idle_timeout: Duration) -> Self {
        Self {
            credentials,
            key: None,
            idle_timeout,
            last_activity: Instant::now(),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> GateState {
        if self.key.is_some() {
            GateState::Unlocked
        } else {
            GateState::Locked
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn add_listener(&mut self, listener: Box<dyn StateListener>) {
        self.listeners.push(listener);
    }

    fn notify(&mut self, state: GateState) {
        for listener in self.listeners.iter_mut() {
            listener.on_state_change(state);
        }
    }

    /// Borrow the live session key, if any.
    pub(crate) fn session_key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// True when the session has outlived the idle window without activity.
    pub(crate) fn idle_expired(&self) -> bool {
        self.key.is_some() && self.last_activity.elapsed() >= self.idle_timeout
    }

    /// Qualifying user activity (pointer/keyboard/touch) resets the idle
    /// window without changing state. A no-op while locked.
    pub(crate) fn notify_activity(&mut self) {
        if self.key.is_some() {
            self.last_activity = Instant::now();
        }
    }

    /// Unlock with a PIN.
    ///
    /// First-time setup: no credential stored, so the PIN (minimum four
    /// characters) becomes the credential, with a fresh device salt.
    /// Subsequent unlocks compare digests in constant time; a mismatch
    /// stays locked and reports only `AuthenticationFailure`.
    pub(crate) fn unlock_with_pin(&mut self, pin: &str) -> Result<(), VaultError> {
        let credential = match self.credentials.load()? {
            Some(credential) => {
                let supplied = keys::pin_digest(pin);
                if !keys::digests_match(&supplied, &credential.pin_hash) {
                    return Err(VaultError::AuthenticationFailure);
                }
                credential
            }
            None => {
                if pin.chars().count() < MIN_PIN_LEN {
                    return Err(VaultError::PinTooShort);
                }
                let credential = Credential {
                    pin_hash: keys::pin_digest(pin),
                    device_salt: crypto::generate_salt()?,
                    passkey_credential_id: None,
                };
                self.credentials.save(&credential)?;
                credential
            }
        };

        let key = keys::derive_session_key(pin.as_bytes(), &credential.device_salt);
        self.install_key(key);
        self.notify(GateState::Unlocked);
        Ok(())
    }

    /// Unlock with a passkey assertion.
    ///
    /// Requires prior enrollment. The assertion bytes are stretched
    /// through the same derivation path as a PIN.
    pub(crate) fn unlock_with_passkey(
        &mut self,
        authenticator: &mut dyn Authenticator,
    ) -> Result<(), VaultError> {
        let credential = self
            .credentials
            .load()?
            .ok_or(VaultError::PasskeyNotEnrolled)?;
        let credential_id = credential
            .passkey_credential_id
            .as_deref()
            .ok_or(VaultError::PasskeyNotEnrolled)?;

        let assertion = authenticator.get_assertion(credential_id)?;
        let key = keys::session_key_from_assertion(&assertion, &credential.device_salt);
        self.install_key(key);
        self.notify(GateState::Unlocked);
        Ok(())
    }

    /// Enroll a platform credential and persist its id.
    pub(crate) fn enroll_passkey(
        &mut self,
        authenticator: &mut dyn Authenticator,
    ) -> Result<(), VaultError> {
        let mut credential = self
            .credentials
            .load()?
            .ok_or(VaultError::AuthenticationFailure)?;
        let id = authenticator.create_credential()?;
        credential.passkey_credential_id = Some(id);
        self.credentials.save(&credential)
    }

    /// Remove and return the session key, without notifying listeners.
    ///
    /// The facade records the `LOGOUT` entry with the returned key before
    /// dropping it (the entry must be sealed while a key still exists),
    /// then calls [`Gate::notify_locked`].
    pub(crate) fn take_key(&mut self) -> Option<SessionKey> {
        self.key.take()
    }

    pub(crate) fn notify_locked(&mut self) {
        self.notify(GateState::Locked);
    }

    fn install_key(&mut self, key: SessionKey) {
        self.key = Some(key);
        self.last_activity = Instant::now();
    }

    /// Verify a PIN against the stored credential without unlocking.
    pub(crate) fn verify_pin(&self, pin: &str) -> Result<(), VaultError> {
        let credential = self
            .credentials
            .load()?
            .ok_or(VaultError::AuthenticationFailure)?;
        let supplied = keys::pin_digest(pin);
        if !keys::digests_match(&supplied, &credential.pin_hash) {
            return Err(VaultError::AuthenticationFailure);
        }
        Ok(())
    }

    /// Derive the key a PIN would produce under the stored device salt.
    pub(crate) fn derive_key_for_pin(&self, pin: &str) -> Result<SessionKey, VaultError> {
        if pin.chars().count() < MIN_PIN_LEN {
            return Err(VaultError::PinTooShort);
        }
        let credential = self
            .credentials
            .load()?
            .ok_or(VaultError::AuthenticationFailure)?;
        Ok(keys::derive_session_key(pin.as_bytes(), &credential.device_salt))
    }

    /// Persist a new PIN digest. The device salt never changes.
    pub(crate) fn set_pin(&mut self, new_pin: &str) -> Result<(), VaultError> {
        if new_pin.chars().count() < MIN_PIN_LEN {
            return Err(VaultError::PinTooShort);
        }
        let mut credential = self
            .credentials
            .load()?
            .ok_or(VaultError::AuthenticationFailure)?;
        credential.pin_hash = keys::pin_digest(new_pin);
        self.credentials.save(&credential)
    }

    /// Replace the live key after a PIN rotation. State stays unlocked,
    /// so listeners are not notified.
    pub(crate) fn replace_key(&mut self, key: SessionKey) {
        self.key = Some(key);
    }
}
