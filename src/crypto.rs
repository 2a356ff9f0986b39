//! Low-level cryptographic operations.
//!
//! This is the only module in the crate that imports `ring`. Everything else
//! encrypts, decrypts and draws randomness through the functions here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM, no padding (authenticated encryption)
//! - **Nonce**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Tag**: 128-bit (16 bytes)
//! - **Key size**: 256 bits (32 bytes)

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{BiosealError, Result};

/// The AEAD algorithm used throughout bioseal.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Size of a key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Fill a fixed-size buffer from the system CSPRNG.
pub(crate) fn random_array<const N: usize>() -> Result<[u8; N]> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; N];
    rng.fill(&mut buf).map_err(|_| BiosealError::RandomnessFailure)?;
    Ok(buf)
}

/// Generate a cryptographically secure random nonce.
///
/// There is no nonce caching or counter-based generation.
pub(crate) fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    random_array::<NONCE_LEN>()
}

/// Generate a cryptographically secure random key.
pub(crate) fn generate_random_key() -> Result<[u8; KEY_LEN]> {
    random_array::<KEY_LEN>()
}

fn less_safe_key(key_bytes: &[u8; KEY_LEN]) -> Result<LessSafeKey> {
    // A 32-byte buffer is always a valid AES-256 key, so this only fails if
    // ring itself is broken.
    let unbound =
        UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| BiosealError::EncryptionFailure)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `key_bytes` with the given nonce.
///
/// Returns `ciphertext || tag`. The nonce is not included in the output; the
/// caller stores it alongside.
pub(crate) fn seal(
    key_bytes: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let key = less_safe_key(key_bytes)?;

    let mut output = Vec::with_capacity(plaintext.len() + TAG_LEN);
    output.extend_from_slice(plaintext);

    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut output)
        .map_err(|_| BiosealError::EncryptionFailure)?;

    Ok(output)
}

/// Decrypt `ciphertext || tag` under `key_bytes` with the given nonce.
///
/// If the key, nonce or ciphertext do not match, the GCM check fails and no
/// partial plaintext is returned.
pub(crate) fn open(
    key_bytes: &[u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.len() < TAG_LEN {
        return Err(BiosealError::AuthenticationTagMismatch);
    }

    let key = less_safe_key(key_bytes)?;
    let mut payload = ciphertext.to_vec();

    let plaintext = key
        .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut payload)
        .map_err(|_| BiosealError::AuthenticationTagMismatch)?;

    Ok(plaintext.to_vec())
}
