//! Key ownership and the key manager.
//!
//! This module owns two responsibilities:
//! 1. Holding key material in a type that is opaque, non-cloneable and
//!    zeroised on drop.
//! 2. [`KeyManager`]: creating the single biometric-bound key on first use,
//!    building ciphers bound to it, and destroying it.
//!
//! ## Key-generation policy
//!
//! ```text
//! AES / GCM / NoPadding, 256-bit key, 128-bit tag
//! purposes       = encrypt + decrypt
//! authentication = required, per use (no validity window)
//! invalidation   = on biometric enrollment change (configurable)
//! ```
//!
//! The policy is applied once, when the key is created. An existing key is
//! always reused; it is never silently regenerated.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::{Cipher, Operation, OperationKind, PendingAuth};
use crate::crypto::{KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{BiosealError, Result};
use crate::keystore::SecureKeyStore;

/// Logical name of the key inside the keystore unless configured otherwise.
pub const DEFAULT_KEY_ALIAS: &str = "biometric_key";

// ---------------------------------------------------------------------------
// Secret key
// ---------------------------------------------------------------------------

/// Raw AES-256 key material handed out by a [`SecureKeyStore`].
///
/// - Not `Clone`.
/// - Zeroised on drop.
/// - Bytes never leave the crate once wrapped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    /// Wrap raw key bytes. Keystore implementations call this when they
    /// release a key for a cipher operation.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Generation parameters and configuration
// ---------------------------------------------------------------------------

/// Parameters a keystore must honour when creating the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGenSpec {
    /// Keystore entry name.
    pub alias: String,
    /// AES key size. Always 256.
    pub key_size_bits: u32,
    /// GCM tag size. Always 128.
    pub tag_len_bits: u32,
    /// The key may encrypt.
    pub purpose_encrypt: bool,
    /// The key may decrypt.
    pub purpose_decrypt: bool,
    /// Every use must be preceded by a successful user authentication.
    pub user_authentication_required: bool,
    /// `true` means there is no validity window: one authentication, one use.
    pub per_use_authentication: bool,
    /// Permanently invalidate the key when the enrolled biometrics change.
    pub invalidated_by_enrollment_change: bool,
}

impl KeyGenSpec {
    /// Cipher transformation the key is restricted to.
    pub const TRANSFORMATION: &'static str = "AES/GCM/NoPadding";

    fn for_config(config: &KeyConfig) -> Self {
        Self {
            alias: config.alias.clone(),
            key_size_bits: (KEY_LEN * 8) as u32,
            tag_len_bits: (TAG_LEN * 8) as u32,
            purpose_encrypt: true,
            purpose_decrypt: true,
            user_authentication_required: true,
            per_use_authentication: true,
            invalidated_by_enrollment_change: config.invalidate_on_enrollment_change,
        }
    }
}

/// Key-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Keystore entry name of the biometric key.
    pub alias: String,
    /// Only effective on keystores that support it.
    pub invalidate_on_enrollment_change: bool,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            alias: DEFAULT_KEY_ALIAS.to_string(),
            invalidate_on_enrollment_change: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Key manager
// ---------------------------------------------------------------------------

/// Owns the biometric-bound key held in a [`SecureKeyStore`].
///
/// Ciphers returned here are *not* usable yet. They must be authorized by a
/// biometric prompt through [`PendingAuth`] before
/// [`token_crypto`](crate::token_crypto) will accept them.
pub struct KeyManager<S> {
    store: S,
    config: KeyConfig,
}

impl<S: SecureKeyStore> KeyManager<S> {
    /// Open the keystore and build a manager for the configured alias.
    ///
    /// # Errors
    ///
    /// [`BiosealError::KeyStoreUnavailable`] if the keystore cannot be loaded.
    pub fn new(store: S, config: KeyConfig) -> Result<Self> {
        store.load()?;
        Ok(Self { store, config })
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// The underlying keystore.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generation parameters used when the key has to be created.
    pub fn key_gen_spec(&self) -> KeyGenSpec {
        KeyGenSpec::for_config(&self.config)
    }

    fn get_or_create_key(&self) -> Result<SecretKey> {
        if let Some(key) = self.store.get_key(&self.config.alias)? {
            return Ok(key);
        }
        let key = self.store.generate_key(&self.key_gen_spec())?;
        log::info!("created biometric key '{}'", self.config.alias);
        Ok(key)
    }

    /// Build an encryption cipher bound to the key, creating the key if absent.
    ///
    /// The nonce is generated by the cipher here and is never caller-supplied.
    ///
    /// # Errors
    ///
    /// [`BiosealError::KeyStoreUnavailable`] or [`BiosealError::InvalidatedKey`].
    /// On the latter the caller must delete the key and reset to disabled.
    pub fn cipher_for_encryption(&self) -> Result<Cipher> {
        let key = self.get_or_create_key()?;
        let nonce = crate::crypto::generate_nonce()?;
        log::debug!("initialised encryption cipher");
        Cipher::init(key, OperationKind::Encrypt, nonce)
    }

    /// Build a decryption cipher for `nonce`, creating the key if absent.
    ///
    /// # Errors
    ///
    /// As [`cipher_for_encryption`](Self::cipher_for_encryption), plus
    /// [`BiosealError::MalformedNonce`] if `nonce` is not 12 bytes.
    pub fn cipher_for_decryption(&self, nonce: &[u8]) -> Result<Cipher> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| BiosealError::MalformedNonce {
            expected: NONCE_LEN,
            actual: nonce.len(),
        })?;
        let key = self.get_or_create_key()?;
        log::debug!("initialised decryption cipher");
        Cipher::init(key, OperationKind::Decrypt, nonce)
    }

    /// First phase of the authorization protocol: build the cipher for `op`
    /// and wrap it so it can only be used after a biometric prompt approves it.
    pub fn request_authorized_operation(&self, op: Operation<'_>) -> Result<PendingAuth> {
        let cipher = match op {
            Operation::Encrypt => self.cipher_for_encryption()?,
            Operation::Decrypt { nonce } => self.cipher_for_decryption(nonce)?,
        };
        Ok(PendingAuth::new(cipher))
    }

    /// Remove the key unconditionally. Succeeds if it is already absent.
    pub fn delete_key(&self) -> Result<()> {
        self.store.delete_entry(&self.config.alias)?;
        log::info!("deleted biometric key '{}'", self.config.alias);
        Ok(())
    }
}
