//! Protection state and its persistence.
//!
//! ```text
//!            on_randomize_token
//!              ┌─────┐
//!              ▼     │
//!          ┌─────────┴┐  on_enable_success   ┌──────────────────┐
//!          │ Initial  │ ───────────────────► │ BiometricEnabled │
//!          └──────────┘ ◄─────────────────── └──────────────────┘
//!                          on_disable
//! ```
//!
//! The persisted [`EncryptedRecord`] is the source of truth for which side of
//! the machine a fresh process starts on.

use uuid::Uuid;

use crate::error::{BiosealError, Result};
use crate::observer::{StateObserver, TransitionEvent, TransitionKind};
use crate::record::{EncryptedRecord, RecordStore};

/// Display token shown while the real token is only recoverable by
/// decrypting the record.
pub const ENCRYPTED_PLACEHOLDER: &str = "**Encrypted**";

/// Generate a new random token.
///
/// This is demo payload, not key material; uniqueness is all that matters.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// What a caller should offer the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Protection is off. `token` lives only in memory.
    Initial { token: String },
    /// Protection is on. `token` is a placeholder; the secret is in `record`.
    BiometricEnabled {
        token: String,
        record: EncryptedRecord,
    },
}

impl AuthState {
    fn initial() -> Self {
        Self::Initial {
            token: generate_token(),
        }
    }

    fn enabled(record: EncryptedRecord) -> Self {
        Self::BiometricEnabled {
            token: ENCRYPTED_PLACEHOLDER.to_string(),
            record,
        }
    }

    /// The token to display.
    pub fn token(&self) -> &str {
        match self {
            Self::Initial { token } | Self::BiometricEnabled { token, .. } => token,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::BiometricEnabled { .. })
    }

    /// The persisted record, present only while enabled.
    pub fn record(&self) -> Option<&EncryptedRecord> {
        match self {
            Self::Initial { .. } => None,
            Self::BiometricEnabled { record, .. } => Some(record),
        }
    }
}

/// The state machine over [`AuthState`], backed by a [`RecordStore`].
///
/// Persistence happens before the in-memory transition, so a failed write
/// leaves the state unchanged.
pub struct AuthStateStore<R> {
    store: R,
    state: Option<AuthState>,
    observers: Vec<Box<dyn StateObserver>>,
}

impl<R: RecordStore> AuthStateStore<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            state: None,
            observers: Vec::new(),
        }
    }

    /// Attach an observer that receives every subsequent transition.
    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    fn notify(&mut self, kind: TransitionKind) {
        let enabled = self.state.as_ref().is_some_and(AuthState::is_enabled);
        let event = TransitionEvent::now(kind, enabled);
        for observer in self.observers.iter_mut() {
            observer.on_transition(&event);
        }
    }

    fn loaded(&mut self) -> Result<&AuthState> {
        if self.state.is_none() {
            let stored = self.store.read()?;
            let state = match EncryptedRecord::from_stored(&stored) {
                Ok(Some(record)) => AuthState::enabled(record),
                Ok(None) => AuthState::initial(),
                // A corrupt record stays enabled until `on_disable` clears it.
                Err(err) => {
                    log::warn!("persisted record cannot be decoded: {err}");
                    AuthState::enabled(EncryptedRecord::from_stored_lossy(&stored))
                }
            };
            log::debug!("loaded auth state (enabled: {})", state.is_enabled());
            self.state = Some(state);
            self.notify(TransitionKind::Loaded);
        }
        self.state
            .as_ref()
            .ok_or(BiosealError::InvalidTransition("state not loaded"))
    }

    /// The current state, reading the persisted record on first call.
    ///
    /// A complete record that cannot be decoded still loads as
    /// `BiometricEnabled`; decrypting it fails with
    /// [`BiosealError::MalformedRecord`] or [`BiosealError::MalformedNonce`].
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn current_state(&mut self) -> Result<AuthState> {
        self.loaded().cloned()
    }

    /// Persist `record` and move to `BiometricEnabled`.
    ///
    /// Call only after the token was encrypted under a biometric-authorized
    /// cipher.
    ///
    /// # Errors
    ///
    /// [`BiosealError::InvalidTransition`] if protection is already enabled.
    pub fn on_enable_success(&mut self, record: EncryptedRecord) -> Result<()> {
        if self.loaded()?.is_enabled() {
            return Err(BiosealError::InvalidTransition(
                "biometric protection is already enabled",
            ));
        }
        self.store.write(&record.to_stored())?;
        self.state = Some(AuthState::enabled(record));
        log::info!("biometric protection enabled");
        self.notify(TransitionKind::Enabled);
        Ok(())
    }

    /// Clear the persisted record and move to `Initial` with a new token.
    ///
    /// The old token is not recovered. This is also the reset path after the
    /// key was invalidated.
    pub fn on_disable(&mut self) -> Result<()> {
        self.store.clear()?;
        self.state = Some(AuthState::initial());
        log::info!("biometric protection disabled");
        self.notify(TransitionKind::Disabled);
        Ok(())
    }

    /// Replace the in-memory token. Only allowed in `Initial`.
    ///
    /// Returns `false`, changing nothing, while protection is enabled.
    pub fn on_randomize_token(&mut self) -> Result<bool> {
        if self.loaded()?.is_enabled() {
            log::debug!("token randomization ignored while protection is enabled");
            return Ok(false);
        }
        self.state = Some(AuthState::initial());
        self.notify(TransitionKind::TokenRandomized);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::TransitionLog;
    use crate::record::{InMemoryRecordStore, StoredRecord};

    /// Twelve zero bytes in base64.
    const ZERO_IV_BASE64: &str = "AAAAAAAAAAAAAAAA";

    fn record() -> EncryptedRecord {
        EncryptedRecord::new(vec![1, 2, 3], vec![4; 12])
    }

    #[test]
    fn empty_store_starts_initial() {
        let mut states = AuthStateStore::new(InMemoryRecordStore::new());
        let state = states.current_state().unwrap();
        assert!(!state.is_enabled());
        assert!(Uuid::parse_str(state.token()).is_ok());
    }

    #[test]
    fn current_state_is_stable_between_reads() {
        let mut states = AuthStateStore::new(InMemoryRecordStore::new());
        assert_eq!(states.current_state().unwrap(), states.current_state().unwrap());
    }

    #[test]
    fn persisted_record_starts_enabled_with_placeholder() {
        let store = InMemoryRecordStore::with_record(record().to_stored());
        let mut states = AuthStateStore::new(store);
        let state = states.current_state().unwrap();
        assert_eq!(state.token(), ENCRYPTED_PLACEHOLDER);
        assert_eq!(state.record(), Some(&record()));
    }

    #[test]
    fn undecodable_record_loads_enabled() {
        let store = InMemoryRecordStore::with_record(StoredRecord {
            encrypted_token: Some("%%%".into()),
            iv: Some(ZERO_IV_BASE64.into()),
        });
        let mut states = AuthStateStore::new(store);
        let state = states.current_state().unwrap();
        assert!(state.is_enabled());
        let record = state.record().unwrap();
        assert!(record.ciphertext().is_empty());
        assert_eq!(record.nonce(), &[0u8; 12]);
    }

    #[test]
    fn enable_twice_is_rejected() {
        let mut states = AuthStateStore::new(InMemoryRecordStore::new());
        states.on_enable_success(record()).unwrap();
        assert!(matches!(
            states.on_enable_success(record()),
            Err(BiosealError::InvalidTransition(_))
        ));
    }

    #[test]
    fn randomize_changes_token_in_initial() {
        let mut states = AuthStateStore::new(InMemoryRecordStore::new());
        let before = states.current_state().unwrap();
        assert!(states.on_randomize_token().unwrap());
        assert_ne!(states.current_state().unwrap().token(), before.token());
    }

    #[test]
    fn disable_clears_both_fields() {
        let store = std::sync::Arc::new(InMemoryRecordStore::new());
        let mut states = AuthStateStore::new(store.clone());
        states.on_enable_success(record()).unwrap();
        assert!(store.read().unwrap().is_complete());

        states.on_disable().unwrap();
        assert_eq!(store.read().unwrap(), StoredRecord::default());
    }

    #[test]
    fn observers_see_each_transition() {
        let log = TransitionLog::new();
        let mut states = AuthStateStore::new(InMemoryRecordStore::new());
        states.add_observer(Box::new(log.clone()));

        states.on_randomize_token().unwrap();
        states.on_enable_success(record()).unwrap();
        states.on_disable().unwrap();

        assert_eq!(
            log.kinds(),
            vec![
                TransitionKind::Loaded,
                TransitionKind::TokenRandomized,
                TransitionKind::Enabled,
                TransitionKind::Disabled,
            ]
        );
        assert!(log.events()[2].enabled);
        assert!(!log.events()[3].enabled);
    }
}
