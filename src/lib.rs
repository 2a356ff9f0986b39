//! # bioseal
//!
//! Biometric-gated protection for a locally stored token.
//!
//! A device-resident AES-256-GCM key is created on first use with the policy
//! "usable only after a fresh biometric check, once per check". The token is
//! encrypted under that key and only the ciphertext and nonce are persisted.
//! When the enrolled biometrics change the key is invalidated by the
//! platform; bioseal detects this and resets protection instead of failing.
//!
//! ## Components
//!
//! - [`keys::KeyManager`]: creates, reuses and deletes the key; builds ciphers.
//! - [`cipher`]: the two-phase protocol that turns a cipher into a single-use
//!   [`cipher::AuthorizedCipher`] once the prompt approves it.
//! - [`token_crypto`]: stateless encrypt/decrypt under an authorized cipher.
//! - [`state::AuthStateStore`]: the `Initial` / `BiometricEnabled` state
//!   machine over a [`record::RecordStore`].
//! - [`session::BiometricSession`]: the enable / authenticate / disable flows.
//!
//! The keystore ([`keystore::SecureKeyStore`]), the prompt
//! ([`prompt::BiometricPrompt`]) and persistence ([`record::RecordStore`]) are
//! injected. In-memory implementations of the keystore and record store are
//! provided.

pub mod cipher;
pub mod config;
pub(crate) mod crypto;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod observer;
pub mod prompt;
pub mod record;
pub mod session;
pub mod state;
pub mod token_crypto;

pub use cipher::{AuthorizedCipher, Cipher, Operation, OperationKind, PendingAuth};
pub use config::BiometricConfig;
pub use crypto::{KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::{BiosealError, ErrorDisposition, Result};
pub use keys::{KeyConfig, KeyGenSpec, KeyManager, SecretKey, DEFAULT_KEY_ALIAS};
pub use keystore::{InMemoryKeyStore, SecureKeyStore};
pub use observer::{StateObserver, TransitionEvent, TransitionKind, TransitionLog};
pub use prompt::{
    AuthProof, Authenticator, Availability, BiometricPrompt, Fallback, OperationChallenge,
    PromptError, PromptInfo,
};
pub use record::{EncryptedRecord, FileRecordStore, InMemoryRecordStore, RecordStore, StoredRecord};
pub use session::{BiometricSession, FlowOutcome};
pub use state::{generate_token, AuthState, AuthStateStore, ENCRYPTED_PLACEHOLDER};
