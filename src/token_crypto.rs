//! Token encryption under an authorized cipher.
//!
//! Stateless. Both functions consume the [`AuthorizedCipher`] they are given,
//! so the same biometric approval cannot be spent twice. No authentication
//! happens here; that is the job of the key manager and the prompt.

use zeroize::Zeroizing;

use crate::cipher::{AuthorizedCipher, OperationKind};
use crate::error::Result;
use crate::record::EncryptedRecord;

/// Encrypt `plaintext` and return the ciphertext together with the nonce the
/// cipher generated for this operation.
///
/// # Errors
///
/// [`WrongCipherMode`](crate::BiosealError::WrongCipherMode) if `cipher` was
/// initialised for decryption.
pub fn encrypt(plaintext: &[u8], cipher: AuthorizedCipher) -> Result<EncryptedRecord> {
    cipher.expect_kind(OperationKind::Encrypt)?;
    let nonce = cipher.nonce().to_vec();
    let ciphertext = cipher.seal(plaintext)?;
    Ok(EncryptedRecord::new(ciphertext, nonce))
}

/// Decrypt `ciphertext` with a cipher initialised for its nonce.
///
/// # Errors
///
/// [`AuthenticationTagMismatch`](crate::BiosealError::AuthenticationTagMismatch)
/// if the ciphertext was altered or the key/nonce pairing is wrong. Altered
/// input never yields plaintext.
pub fn decrypt(ciphertext: &[u8], cipher: AuthorizedCipher) -> Result<Zeroizing<Vec<u8>>> {
    cipher.expect_kind(OperationKind::Decrypt)?;
    Ok(Zeroizing::new(cipher.open(ciphertext)?))
}
