//! Key lifecycle through the public API.

use std::sync::Arc;

use bioseal::{
    BiosealError, InMemoryKeyStore, KeyConfig, KeyManager, Operation, DEFAULT_KEY_ALIAS,
};

fn shared_manager() -> (Arc<InMemoryKeyStore>, KeyManager<Arc<InMemoryKeyStore>>) {
    let store = Arc::new(InMemoryKeyStore::new());
    let keys = KeyManager::new(Arc::clone(&store), KeyConfig::default()).unwrap();
    (store, keys)
}

#[test]
fn delete_key_twice_is_not_an_error() {
    let (store, keys) = shared_manager();
    keys.cipher_for_encryption().unwrap();
    assert!(store.contains(DEFAULT_KEY_ALIAS));

    keys.delete_key().unwrap();
    keys.delete_key().unwrap();
    assert!(store.is_empty());
}

#[test]
fn delete_key_without_key_is_not_an_error() {
    let (store, keys) = shared_manager();
    keys.delete_key().unwrap();
    assert!(store.is_empty());
}

#[test]
fn deleted_key_is_replaced_on_next_use() {
    let (store, keys) = shared_manager();
    keys.cipher_for_encryption().unwrap();
    keys.delete_key().unwrap();
    keys.cipher_for_encryption().unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn keystore_going_offline_is_surfaced() {
    let (store, keys) = shared_manager();
    store.set_available(false);
    assert!(matches!(
        keys.request_authorized_operation(Operation::Encrypt),
        Err(BiosealError::KeyStoreUnavailable(_))
    ));
}

#[test]
fn invalidated_key_reported_for_both_directions() {
    let (store, keys) = shared_manager();
    keys.cipher_for_encryption().unwrap();
    store.change_enrollment();

    assert!(matches!(
        keys.cipher_for_encryption(),
        Err(BiosealError::InvalidatedKey)
    ));
    assert!(matches!(
        keys.cipher_for_decryption(&[0u8; bioseal::NONCE_LEN]),
        Err(BiosealError::InvalidatedKey)
    ));

    keys.delete_key().unwrap();
    assert!(keys.cipher_for_encryption().is_ok());
}

#[test]
fn custom_alias_is_used() {
    let store = Arc::new(InMemoryKeyStore::new());
    let config = KeyConfig {
        alias: "demo_key".into(),
        ..KeyConfig::default()
    };
    let keys = KeyManager::new(Arc::clone(&store), config).unwrap();
    keys.cipher_for_encryption().unwrap();
    assert!(store.contains("demo_key"));
    assert!(!store.contains(DEFAULT_KEY_ALIAS));
}
