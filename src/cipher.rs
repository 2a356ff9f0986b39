//! Cipher instances and the two-phase authorization protocol.
//!
//! ```text
//! KeyManager::request_authorized_operation(op) ──► PendingAuth
//! PendingAuth::await_outcome(prompt, info)     ──► AuthorizedCipher | error
//! token_crypto::{encrypt, decrypt}(.., AuthorizedCipher)
//! ```
//!
//! A [`Cipher`] is bound to one key, one operation and one nonce. It cannot
//! transform data until it has been turned into an [`AuthorizedCipher`] by a
//! proof for its own challenge. An `AuthorizedCipher` is consumed by the first
//! transform it is given, so one biometric check buys exactly one operation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{self, NONCE_LEN, TAG_LEN};
use crate::error::{BiosealError, Result};
use crate::keys::SecretKey;
use crate::prompt::{
    AuthProof, Authenticator, BiometricPrompt, OperationChallenge, PromptInfo, CHALLENGE_LEN,
};

/// Which direction a cipher was initialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Encrypt,
    Decrypt,
}

/// A cipher operation to request from the [`KeyManager`](crate::keys::KeyManager).
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Encrypt,
    /// Decrypt with the nonce that was stored next to the ciphertext.
    Decrypt { nonce: &'a [u8] },
}

impl Operation<'_> {
    /// Direction the cipher for this operation will be initialised in.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Encrypt => OperationKind::Encrypt,
            Self::Decrypt { .. } => OperationKind::Decrypt,
        }
    }
}

/// A cipher bound to the biometric key, not yet authorized for use.
pub struct Cipher {
    key: SecretKey,
    nonce: [u8; NONCE_LEN],
    challenge: OperationChallenge,
}

impl Cipher {
    pub(crate) fn init(
        key: SecretKey,
        kind: OperationKind,
        nonce: [u8; NONCE_LEN],
    ) -> Result<Self> {
        let id = crypto::random_array::<CHALLENGE_LEN>()?;
        Ok(Self {
            key,
            nonce,
            challenge: OperationChallenge::new(kind, id),
        })
    }

    /// Direction this cipher was initialised for.
    pub fn kind(&self) -> OperationKind {
        self.challenge.kind()
    }

    /// The nonce this cipher will use. For encryption it was generated when
    /// the cipher was built.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// GCM tag length in bits.
    pub fn tag_len_bits(&self) -> u32 {
        (TAG_LEN * 8) as u32
    }

    /// The challenge the biometric prompt must answer for this instance.
    pub fn challenge(&self) -> &OperationChallenge {
        &self.challenge
    }

    #[cfg(test)]
    pub(crate) fn key_bytes(&self) -> [u8; crypto::KEY_LEN] {
        *self.key.as_bytes()
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// A cipher waiting for the biometric outcome.
#[derive(Debug)]
pub struct PendingAuth {
    cipher: Cipher,
}

impl PendingAuth {
    /// Hold `cipher` until a prompt authorizes it.
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher }
    }

    pub fn kind(&self) -> OperationKind {
        self.cipher.kind()
    }

    pub fn challenge(&self) -> &OperationChallenge {
        self.cipher.challenge()
    }

    /// Show `prompt` for this operation and wait for the user.
    ///
    /// # Errors
    ///
    /// [`BiosealError::Prompt`] when the prompt does not succeed (including
    /// cancellation, see [`PromptError::is_cancellation`](crate::prompt::PromptError::is_cancellation)),
    /// [`BiosealError::ProofMismatch`] when the returned proof is for another
    /// operation or weaker than `info.min_strength` allows.
    pub async fn await_outcome<P: BiometricPrompt>(
        self,
        prompt: &P,
        info: &PromptInfo,
    ) -> Result<AuthorizedCipher> {
        let proof = prompt.authenticate(info, self.cipher.challenge()).await?;
        if info.min_strength == Authenticator::BiometricStrong
            && proof.authenticator() != Authenticator::BiometricStrong
        {
            return Err(BiosealError::ProofMismatch);
        }
        self.authorize(&proof)
    }

    /// Complete authorization with a proof obtained out of band, for
    /// platforms that deliver the outcome through a callback.
    pub fn authorize(self, proof: &AuthProof) -> Result<AuthorizedCipher> {
        if !proof.matches(self.cipher.challenge()) {
            return Err(BiosealError::ProofMismatch);
        }
        Ok(AuthorizedCipher {
            cipher: self.cipher,
        })
    }
}

/// A single-use cipher that a biometric check has approved.
#[derive(Debug)]
pub struct AuthorizedCipher {
    pub(crate) cipher: Cipher,
}

impl AuthorizedCipher {
    pub fn kind(&self) -> OperationKind {
        self.cipher.kind()
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        self.cipher.nonce()
    }

    pub(crate) fn expect_kind(&self, expected: OperationKind) -> Result<()> {
        let actual = self.kind();
        if actual != expected {
            return Err(BiosealError::WrongCipherMode { expected, actual });
        }
        Ok(())
    }

    pub(crate) fn seal(self, plaintext: &[u8]) -> Result<Vec<u8>> {
        crypto::seal(self.cipher.key.as_bytes(), self.cipher.nonce, plaintext)
    }

    pub(crate) fn open(self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        crypto::open(self.cipher.key.as_bytes(), self.cipher.nonce, ciphertext)
    }
}
