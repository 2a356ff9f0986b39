//! AuthStateStore transitions and persistence.

use std::sync::Arc;

use bioseal::{
    AuthState, AuthStateStore, BiosealError, EncryptedRecord, FileRecordStore,
    InMemoryRecordStore, RecordStore, StoredRecord, ENCRYPTED_PLACEHOLDER,
};

fn record() -> EncryptedRecord {
    EncryptedRecord::new(vec![0xAA; 32], vec![0xBB; 12])
}

#[test]
fn enable_then_disable_rerandomizes_token() {
    let mut states = AuthStateStore::new(InMemoryRecordStore::new());
    let entry = states.current_state().unwrap();
    assert!(matches!(entry, AuthState::Initial { .. }));

    states.on_enable_success(record()).unwrap();
    assert!(states.current_state().unwrap().is_enabled());

    states.on_disable().unwrap();
    let after = states.current_state().unwrap();
    assert!(matches!(after, AuthState::Initial { .. }));
    assert_ne!(after.token(), entry.token());
    assert_ne!(after.token(), ENCRYPTED_PLACEHOLDER);
}

#[test]
fn randomize_while_enabled_changes_nothing() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut states = AuthStateStore::new(Arc::clone(&store));
    states.on_enable_success(record()).unwrap();
    let persisted = store.read().unwrap();
    let before = states.current_state().unwrap();

    assert!(!states.on_randomize_token().unwrap());

    assert_eq!(states.current_state().unwrap(), before);
    assert_eq!(store.read().unwrap(), persisted);
}

#[test]
fn partial_record_starts_initial() {
    let store = InMemoryRecordStore::with_record(StoredRecord {
        encrypted_token: None,
        iv: Some("abc".into()),
    });
    let mut states = AuthStateStore::new(store);
    assert!(matches!(
        states.current_state().unwrap(),
        AuthState::Initial { .. }
    ));
}

#[test]
fn ciphertext_without_nonce_starts_initial() {
    let store = InMemoryRecordStore::with_record(StoredRecord {
        encrypted_token: Some("AAAA".into()),
        iv: None,
    });
    let mut states = AuthStateStore::new(store);
    assert!(!states.current_state().unwrap().is_enabled());
}

#[test]
fn undecodable_record_loads_enabled_and_can_be_cleared() {
    let store = Arc::new(InMemoryRecordStore::with_record(StoredRecord {
        encrypted_token: Some("%%%".into()),
        iv: Some("AAAAAAAAAAAAAAAA".into()),
    }));
    let mut states = AuthStateStore::new(Arc::clone(&store));
    let state = states.current_state().unwrap();
    assert!(state.is_enabled());
    assert_eq!(state.token(), ENCRYPTED_PLACEHOLDER);
    assert!(!states.on_randomize_token().unwrap());

    states.on_disable().unwrap();
    assert_eq!(store.read().unwrap(), StoredRecord::default());
    assert!(!states.current_state().unwrap().is_enabled());
}

#[test]
fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("authentication.json");

    let mut states = AuthStateStore::new(FileRecordStore::new(&path));
    states.on_enable_success(record()).unwrap();
    drop(states);

    let mut reopened = AuthStateStore::new(FileRecordStore::new(&path));
    let state = reopened.current_state().unwrap();
    assert_eq!(state.token(), ENCRYPTED_PLACEHOLDER);
    assert_eq!(state.record(), Some(&record()));

    reopened.on_disable().unwrap();
    assert!(!path.exists());
    let mut cleared = AuthStateStore::new(FileRecordStore::new(&path));
    assert!(!cleared.current_state().unwrap().is_enabled());
}

#[test]
fn file_store_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileRecordStore::new(dir.path().join("record.json"));
    store.write(&record().to_stored()).unwrap();
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("record.json")]);
}

#[test]
fn failed_file_write_cleans_up_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    // A directory in the way makes the final rename fail.
    std::fs::create_dir(&path).unwrap();

    let store = FileRecordStore::new(&path);
    assert!(matches!(
        store.write(&record().to_stored()),
        Err(BiosealError::Storage(_))
    ));
    assert!(!dir.path().join("record.json.tmp").exists());
    assert!(path.is_dir());
}

#[test]
fn file_store_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    std::fs::write(&path, b"not json").unwrap();
    assert!(matches!(
        FileRecordStore::new(&path).read(),
        Err(BiosealError::Storage(_))
    ));
}
