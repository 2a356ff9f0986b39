//! The secure keystore capability.
//!
//! On a device this is backed by hardware (a TEE or secure element) and the
//! key bytes never reach application memory. [`SecureKeyStore`] is the seam
//! where such a platform keystore plugs in; [`InMemoryKeyStore`] is a
//! software model of the same contract for tests and host builds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::error::{BiosealError, Result};
use crate::keys::{KeyGenSpec, SecretKey};

/// Device keystore holding the biometric-bound key.
///
/// Implementations must make creation and deletion atomic: a key is either
/// fully present under its alias or absent.
pub trait SecureKeyStore: Send + Sync {
    /// Open the keystore.
    ///
    /// # Errors
    ///
    /// [`BiosealError::KeyStoreUnavailable`] if it cannot be opened.
    fn load(&self) -> Result<()>;

    /// Fetch the key stored under `alias`, if present.
    ///
    /// # Errors
    ///
    /// [`BiosealError::InvalidatedKey`] if the key exists but has been
    /// permanently invalidated, or [`BiosealError::KeyStoreUnavailable`].
    fn get_key(&self, alias: &str) -> Result<Option<SecretKey>>;

    /// Create a key according to `spec` and store it under `spec.alias`.
    ///
    /// Must not replace a key that already exists under that alias.
    fn generate_key(&self, spec: &KeyGenSpec) -> Result<SecretKey>;

    /// Remove the entry for `alias`. Removing an absent entry is not an error.
    fn delete_entry(&self, alias: &str) -> Result<()>;
}

impl<T: SecureKeyStore + ?Sized> SecureKeyStore for Arc<T> {
    fn load(&self) -> Result<()> {
        (**self).load()
    }

    fn get_key(&self, alias: &str) -> Result<Option<SecretKey>> {
        (**self).get_key(alias)
    }

    fn generate_key(&self, spec: &KeyGenSpec) -> Result<SecretKey> {
        (**self).generate_key(spec)
    }

    fn delete_entry(&self, alias: &str) -> Result<()> {
        (**self).delete_entry(alias)
    }
}

// ---------------------------------------------------------------------------
// In-memory keystore
// ---------------------------------------------------------------------------

struct Entry {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    spec: KeyGenSpec,
    /// Enrollment generation at creation time.
    enrollment: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    enrollment: u64,
    loaded: bool,
    unavailable: bool,
}

impl Inner {
    fn usable_key(&self, alias: &str) -> Result<Option<SecretKey>> {
        let Some(entry) = self.entries.get(alias) else {
            return Ok(None);
        };
        if entry.spec.invalidated_by_enrollment_change && entry.enrollment != self.enrollment {
            return Err(BiosealError::InvalidatedKey);
        }
        Ok(Some(SecretKey::from_bytes(*entry.bytes)))
    }
}

/// Software keystore that models the platform contract.
///
/// Supports simulating a change of the enrolled biometric set
/// ([`change_enrollment`](Self::change_enrollment)) and an unreachable
/// keystore ([`set_available`](Self::set_available)).
#[derive(Default)]
pub struct InMemoryKeyStore {
    inner: Mutex<Inner>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| BiosealError::KeyStoreUnavailable("keystore lock poisoned".into()))
    }

    fn open(&self) -> Result<MutexGuard<'_, Inner>> {
        let inner = self.lock()?;
        if inner.unavailable {
            return Err(BiosealError::KeyStoreUnavailable("keystore offline".into()));
        }
        if !inner.loaded {
            return Err(BiosealError::KeyStoreUnavailable("keystore not loaded".into()));
        }
        Ok(inner)
    }

    /// Simulate the user adding or removing a fingerprint or face.
    pub fn change_enrollment(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.enrollment += 1;
        }
    }

    /// Make every subsequent operation fail with `KeyStoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = !available;
        }
    }

    /// Whether an entry exists under `alias`, invalidated or not.
    pub fn contains(&self, alias: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.entries.contains_key(alias))
            .unwrap_or(false)
    }

    /// Number of stored entries, invalidated ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecureKeyStore for InMemoryKeyStore {
    fn load(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.unavailable {
            return Err(BiosealError::KeyStoreUnavailable("keystore offline".into()));
        }
        inner.loaded = true;
        Ok(())
    }

    fn get_key(&self, alias: &str) -> Result<Option<SecretKey>> {
        self.open()?.usable_key(alias)
    }

    /// Creates the key, or returns the one already stored under
    /// `spec.alias` if another caller created it first.
    fn generate_key(&self, spec: &KeyGenSpec) -> Result<SecretKey> {
        if spec.key_size_bits as usize != KEY_LEN * 8 {
            return Err(BiosealError::KeyStoreUnavailable(format!(
                "unsupported key size: {} bits",
                spec.key_size_bits
            )));
        }

        let mut inner = self.open()?;
        if let Some(existing) = inner.usable_key(&spec.alias)? {
            return Ok(existing);
        }
        let bytes = Zeroizing::new(crypto::generate_random_key()?);
        let enrollment = inner.enrollment;
        let key = SecretKey::from_bytes(*bytes);
        inner.entries.insert(
            spec.alias.clone(),
            Entry {
                bytes,
                spec: spec.clone(),
                enrollment,
            },
        );
        Ok(key)
    }

    fn delete_entry(&self, alias: &str) -> Result<()> {
        let mut inner = self.open()?;
        inner.entries.remove(alias);
        Ok(())
    }
}
