//! Error types for bioseal.
//!
//! Every variant is a distinct failure mode of the biometric-gated key and
//! token lifecycle. Messages say *what* failed without revealing key material,
//! tokens or plaintext.

use thiserror::Error;

use crate::cipher::OperationKind;
use crate::prompt::{Availability, PromptError};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BiosealError>;

/// The single error type for all bioseal operations.
#[derive(Debug, Error)]
pub enum BiosealError {
    /// The secure keystore could not be opened, read or written.
    #[error("keystore unavailable: {0}")]
    KeyStoreUnavailable(String),

    /// The stored key was permanently invalidated, typically because the
    /// enrolled biometric set changed after the key was created.
    #[error("key permanently invalidated")]
    InvalidatedKey,

    /// A nonce did not match what AES-256-GCM expects.
    #[error("malformed nonce: expected {expected} bytes, got {actual}")]
    MalformedNonce {
        /// Required nonce length in bytes.
        expected: usize,
        /// Length that was supplied (0 when undecodable).
        actual: usize,
    },

    /// Decryption failed: tampered ciphertext or wrong key/nonce pairing.
    #[error("decryption failed: authentication tag mismatch")]
    AuthenticationTagMismatch,

    /// The underlying `ring` seal operation returned an error.
    #[error("encryption failed")]
    EncryptionFailure,

    /// The system's random number generator failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// A cipher initialised for one operation was used for the other.
    #[error("cipher initialised for {actual:?}, expected {expected:?}")]
    WrongCipherMode {
        /// Operation the caller attempted.
        expected: OperationKind,
        /// Operation the cipher was initialised for.
        actual: OperationKind,
    },

    /// The prompt returned a proof that belongs to another operation.
    #[error("authorization proof does not match this operation")]
    ProofMismatch,

    /// The persisted record exists but cannot be decoded.
    #[error("malformed encrypted record: {0}")]
    MalformedRecord(String),

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The state machine rejected an operation in its current state.
    #[error("invalid state transition: {0}")]
    InvalidTransition(&'static str),

    /// Biometric authentication cannot be offered on this device right now.
    #[error("{}", .0.message())]
    BiometricUnavailable(Availability),

    /// The biometric prompt resolved without success.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// How a caller should react to a [`BiosealError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Explicit user cancellation. Nothing is shown and no state changes.
    Silent,
    /// Surface the message as a transient notification; the user may retry.
    Transient,
    /// The key is gone. Delete it and reset protection to disabled.
    ResetRequired,
}

impl BiosealError {
    /// Classify this error for presentation and recovery.
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::InvalidatedKey => ErrorDisposition::ResetRequired,
            Self::Prompt(err) if err.is_cancellation() => ErrorDisposition::Silent,
            _ => ErrorDisposition::Transient,
        }
    }
}
