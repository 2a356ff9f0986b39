//! End-to-end flows around the biometric prompt.
//!
//! A [`BiometricSession`] ties the key manager, token crypto and state store
//! together the way an app drives them:
//!
//! 1. Check that the device can authenticate.
//! 2. Build a cipher for the operation.
//! 3. Wait for the prompt to authorize that cipher.
//! 4. Transform the token and persist or reveal the result.
//!
//! Cancellation at step 3 changes nothing. An invalidated key at step 2 is
//! recovered by deleting the key and resetting to `Initial`.

use zeroize::Zeroizing;

use crate::cipher::Operation;
use crate::config::BiometricConfig;
use crate::crypto::TAG_LEN;
use crate::error::{BiosealError, Result};
use crate::keys::KeyManager;
use crate::keystore::SecureKeyStore;
use crate::observer::StateObserver;
use crate::prompt::{BiometricPrompt, PromptInfo};
use crate::record::RecordStore;
use crate::state::{AuthState, AuthStateStore};
use crate::token_crypto;

/// How a flow ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome<T> {
    Completed(T),
    /// The user cancelled or the prompt timed out. Nothing changed.
    Cancelled,
    /// The key had been invalidated. It was deleted and protection was reset;
    /// the user has to enable protection again.
    KeyInvalidated,
}

impl<T> FlowOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// The biometric-gated token, its key and its state.
pub struct BiometricSession<S, R> {
    keys: KeyManager<S>,
    state: AuthStateStore<R>,
    config: BiometricConfig,
}

impl<S: SecureKeyStore, R: RecordStore> BiometricSession<S, R> {
    /// # Errors
    ///
    /// [`BiosealError::KeyStoreUnavailable`] if the keystore cannot be opened.
    pub fn new(keystore: S, records: R, config: BiometricConfig) -> Result<Self> {
        Ok(Self {
            keys: KeyManager::new(keystore, config.key.clone())?,
            state: AuthStateStore::new(records),
            config,
        })
    }

    /// The key manager, for callers that drive ciphers directly.
    pub fn keys(&self) -> &KeyManager<S> {
        &self.keys
    }

    pub fn config(&self) -> &BiometricConfig {
        &self.config
    }

    /// Forward every state transition to `observer`.
    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.state.add_observer(observer);
    }

    /// The current protection state.
    pub fn state(&mut self) -> Result<AuthState> {
        self.state.current_state()
    }

    fn ensure_available<P: BiometricPrompt>(prompt: &P, info: &PromptInfo) -> Result<()> {
        let availability = prompt.can_authenticate(info.min_strength);
        if !availability.is_available() {
            return Err(BiosealError::BiometricUnavailable(availability));
        }
        Ok(())
    }

    /// Drop the invalidated key and return to `Initial`.
    ///
    /// The state is reset even if the keystore refuses to delete the entry.
    fn reset_after_invalidation<T>(&mut self) -> Result<FlowOutcome<T>> {
        log::warn!("biometric key invalidated, resetting protection");
        if let Err(err) = self.keys.delete_key() {
            log::warn!("failed to delete invalidated biometric key: {err}");
        }
        self.state.on_disable()?;
        Ok(FlowOutcome::KeyInvalidated)
    }

    /// Encrypt the current token under a freshly authorized cipher and turn
    /// protection on.
    ///
    /// # Errors
    ///
    /// [`BiosealError::InvalidTransition`] if already enabled,
    /// [`BiosealError::BiometricUnavailable`], non-cancellation prompt errors,
    /// and keystore, crypto or storage failures.
    pub async fn enable<P: BiometricPrompt>(&mut self, prompt: &P) -> Result<FlowOutcome<()>> {
        let token = match self.state.current_state()? {
            AuthState::Initial { token } => Zeroizing::new(token),
            AuthState::BiometricEnabled { .. } => {
                return Err(BiosealError::InvalidTransition(
                    "biometric protection is already enabled",
                ))
            }
        };
        let info = self.config.enable_prompt.clone();
        Self::ensure_available(prompt, &info)?;

        let pending = match self.keys.request_authorized_operation(Operation::Encrypt) {
            Err(BiosealError::InvalidatedKey) => return self.reset_after_invalidation(),
            other => other?,
        };

        let cipher = match pending.await_outcome(prompt, &info).await {
            Err(BiosealError::Prompt(err)) if err.is_cancellation() => {
                log::debug!("enable cancelled: {err}");
                return Ok(FlowOutcome::Cancelled);
            }
            other => other?,
        };

        let record = token_crypto::encrypt(token.as_bytes(), cipher)?;
        self.state.on_enable_success(record)?;
        Ok(FlowOutcome::Completed(()))
    }

    /// Decrypt the protected token after a biometric check.
    ///
    /// # Errors
    ///
    /// [`BiosealError::InvalidTransition`] if protection is off,
    /// [`BiosealError::MalformedRecord`] or [`BiosealError::MalformedNonce`]
    /// for corrupted persisted state, before any prompt is shown,
    /// [`BiosealError::AuthenticationTagMismatch`] if the record was altered,
    /// plus the errors of [`enable`](Self::enable).
    pub async fn authenticate<P: BiometricPrompt>(
        &mut self,
        prompt: &P,
    ) -> Result<FlowOutcome<Zeroizing<String>>> {
        let record = match self.state.current_state()? {
            AuthState::BiometricEnabled { record, .. } => record,
            AuthState::Initial { .. } => {
                return Err(BiosealError::InvalidTransition(
                    "biometric protection is not enabled",
                ))
            }
        };
        if record.ciphertext().len() < TAG_LEN {
            return Err(BiosealError::MalformedRecord(
                "ciphertext is shorter than the authentication tag".into(),
            ));
        }
        let info = self.config.authenticate_prompt.clone();
        Self::ensure_available(prompt, &info)?;

        let op = Operation::Decrypt {
            nonce: record.nonce(),
        };
        let pending = match self.keys.request_authorized_operation(op) {
            Err(BiosealError::InvalidatedKey) => return self.reset_after_invalidation(),
            other => other?,
        };

        let cipher = match pending.await_outcome(prompt, &info).await {
            Err(BiosealError::Prompt(err)) if err.is_cancellation() => {
                log::debug!("authentication cancelled: {err}");
                return Ok(FlowOutcome::Cancelled);
            }
            other => other?,
        };

        let plaintext = token_crypto::decrypt(record.ciphertext(), cipher)?;
        let token = std::str::from_utf8(&plaintext)
            .map_err(|_| BiosealError::MalformedRecord("token is not valid UTF-8".into()))?;
        Ok(FlowOutcome::Completed(Zeroizing::new(token.to_string())))
    }

    /// Delete the key and turn protection off.
    ///
    /// The record is cleared even if deleting the key fails; the deletion
    /// error is still returned.
    pub fn disable(&mut self) -> Result<()> {
        let deleted = self.keys.delete_key();
        if let Err(err) = &deleted {
            log::warn!("failed to delete biometric key: {err}");
        }
        self.state.on_disable()?;
        deleted
    }

    /// Replace the in-memory token. Returns `false` while protection is on.
    pub fn randomize_token(&mut self) -> Result<bool> {
        self.state.on_randomize_token()
    }
}
