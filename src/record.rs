//! The persisted encrypted token and the stores that hold it.
//!
//! On disk the record is two text fields, `encrypted_token` and `iv`, each
//! base64 encoded. They are written and cleared together. A record with only
//! one field present is treated exactly like no record at all.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::NONCE_LEN;
use crate::error::{BiosealError, Result};

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Ciphertext and nonce of the protected token.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    ciphertext: Vec<u8>,
    nonce: Vec<u8>,
}

impl EncryptedRecord {
    /// Pair a ciphertext (tag appended) with its nonce.
    pub fn new(ciphertext: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self { ciphertext, nonce }
    }

    /// Ciphertext followed by the GCM tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Text form for persistence.
    pub fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            encrypted_token: Some(STANDARD.encode(&self.ciphertext)),
            iv: Some(STANDARD.encode(&self.nonce)),
        }
    }

    /// Decode a persisted record. Returns `None` unless both fields exist.
    ///
    /// # Errors
    ///
    /// [`BiosealError::MalformedRecord`] if the ciphertext is not valid
    /// base64, [`BiosealError::MalformedNonce`] if the nonce is not.
    pub fn from_stored(stored: &StoredRecord) -> Result<Option<Self>> {
        let (Some(token), Some(iv)) = (&stored.encrypted_token, &stored.iv) else {
            return Ok(None);
        };
        let ciphertext = STANDARD
            .decode(token)
            .map_err(|err| BiosealError::MalformedRecord(err.to_string()))?;
        let nonce = STANDARD.decode(iv).map_err(|_| BiosealError::MalformedNonce {
            expected: NONCE_LEN,
            actual: 0,
        })?;
        Ok(Some(Self { ciphertext, nonce }))
    }

    /// Decode what can be decoded. A field that is missing or not valid
    /// base64 comes back empty, which decryption rejects.
    pub(crate) fn from_stored_lossy(stored: &StoredRecord) -> Self {
        let decode = |field: &Option<String>| {
            field
                .as_deref()
                .and_then(|text| STANDARD.decode(text).ok())
                .unwrap_or_default()
        };
        Self {
            ciphertext: decode(&stored.encrypted_token),
            nonce: decode(&stored.iv),
        }
    }
}

impl fmt::Debug for EncryptedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedRecord")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("nonce_len", &self.nonce.len())
            .finish()
    }
}

/// The two persisted text fields, exactly as the store holds them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl StoredRecord {
    /// Both fields present.
    pub fn is_complete(&self) -> bool {
        self.encrypted_token.is_some() && self.iv.is_some()
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Durable storage for the encrypted record.
///
/// `write` and `clear` must be atomic over both fields.
pub trait RecordStore: Send + Sync {
    fn read(&self) -> Result<StoredRecord>;

    fn write(&self, record: &StoredRecord) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn read(&self) -> Result<StoredRecord> {
        (**self).read()
    }

    fn write(&self, record: &StoredRecord) -> Result<()> {
        (**self).write(record)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ---------------------------------------------------------------------------
// Built-in store: memory
// ---------------------------------------------------------------------------

/// Record store backed by a mutex-guarded value.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    record: Mutex<StoredRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `record` already persisted.
    pub fn with_record(record: StoredRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn read(&self) -> Result<StoredRecord> {
        self.record
            .lock()
            .map(|record| record.clone())
            .map_err(|_| BiosealError::Storage("record lock poisoned".into()))
    }

    fn write(&self, record: &StoredRecord) -> Result<()> {
        let mut guard = self
            .record
            .lock()
            .map_err(|_| BiosealError::Storage("record lock poisoned".into()))?;
        *guard = record.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.write(&StoredRecord::default())
    }
}

// ---------------------------------------------------------------------------
// Built-in store: file
// ---------------------------------------------------------------------------

/// Record store that keeps the record as a JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers see either the old record or the new one. A failed write
/// removes the temp file.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    /// Store the record at `path`. The file is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the directory entry so the rename survives a crash. Not every
    /// platform can open a directory, so failures are ignored.
    fn sync_parent(&self) {
        let Some(parent) = self.path.parent() else {
            return;
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn storage_err(err: io::Error) -> BiosealError {
    BiosealError::Storage(err.to_string())
}

impl RecordStore for FileRecordStore {
    fn read(&self) -> Result<StoredRecord> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| BiosealError::Storage(err.to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(StoredRecord::default()),
            Err(err) => Err(storage_err(err)),
        }
    }

    fn write(&self, record: &StoredRecord) -> Result<()> {
        let json =
            serde_json::to_vec(record).map_err(|err| BiosealError::Storage(err.to_string()))?;
        let temp = self.temp_path();
        let written = fs::File::create(&temp).and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&temp, &self.path)
        });
        if let Err(err) = written {
            let _ = fs::remove_file(&temp);
            return Err(storage_err(err));
        }
        self.sync_parent();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_record_is_no_record() {
        let stored = StoredRecord {
            encrypted_token: None,
            iv: Some("abc".into()),
        };
        assert!(!stored.is_complete());
        assert!(EncryptedRecord::from_stored(&stored).unwrap().is_none());
    }

    #[test]
    fn text_form_roundtrips() {
        let record = EncryptedRecord::new(vec![1, 2, 3, 4], vec![9; 12]);
        let stored = record.to_stored();
        assert!(stored.is_complete());
        assert_eq!(EncryptedRecord::from_stored(&stored).unwrap(), Some(record));
    }

    #[test]
    fn bad_nonce_encoding_is_malformed_nonce() {
        let stored = StoredRecord {
            encrypted_token: Some("AQID".into()),
            iv: Some("not base64!".into()),
        };
        assert!(matches!(
            EncryptedRecord::from_stored(&stored),
            Err(BiosealError::MalformedNonce { .. })
        ));
    }

    #[test]
    fn lossy_decode_keeps_valid_fields() {
        let stored = StoredRecord {
            encrypted_token: Some("AQID".into()),
            iv: Some("not base64!".into()),
        };
        let record = EncryptedRecord::from_stored_lossy(&stored);
        assert_eq!(record.ciphertext(), &[1, 2, 3]);
        assert!(record.nonce().is_empty());
    }

    #[test]
    fn stored_record_uses_persisted_field_names() {
        let json = serde_json::to_string(&EncryptedRecord::new(vec![0], vec![0]).to_stored()).unwrap();
        assert!(json.contains("\"encrypted_token\""));
        assert!(json.contains("\"iv\""));
    }

    #[test]
    fn debug_does_not_print_bytes() {
        let rendered = format!("{:?}", EncryptedRecord::new(vec![0xAB; 4], vec![0xCD; 12]));
        assert_eq!(rendered, "EncryptedRecord { ciphertext_len: 4, nonce_len: 12 }");
    }
}
