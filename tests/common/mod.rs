//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bioseal::{
    AuthProof, Authenticator, AuthorizedCipher, Availability, BiometricPrompt,
    OperationChallenge, PendingAuth, PromptError, PromptInfo,
};

/// What the scripted prompt does on its next invocation.
#[derive(Debug, Clone)]
pub enum Step {
    Approve,
    /// Approve with a class 2 biometric.
    ApproveWeak,
    /// Return a proof for some other operation.
    Forge,
    Fail(PromptError),
}

/// A prompt that replays a fixed script, then approves everything.
pub struct ScriptedPrompt {
    availability: Availability,
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    last_info: Mutex<Option<PromptInfo>>,
}

impl ScriptedPrompt {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            availability: Availability::Available,
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
            last_info: Mutex::new(None),
        }
    }

    pub fn approving() -> Self {
        Self::new([])
    }

    pub fn failing(err: PromptError) -> Self {
        Self::new([Step::Fail(err)])
    }

    pub fn unavailable(availability: Availability) -> Self {
        Self {
            availability,
            ..Self::approving()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_info(&self) -> Option<PromptInfo> {
        self.last_info.lock().unwrap().clone()
    }
}

impl BiometricPrompt for ScriptedPrompt {
    fn can_authenticate(&self, _min_strength: Authenticator) -> Availability {
        self.availability
    }

    async fn authenticate(
        &self,
        info: &PromptInfo,
        challenge: &OperationChallenge,
    ) -> Result<AuthProof, PromptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_info.lock().unwrap() = Some(info.clone());
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Approve);
        match step {
            Step::Approve => Ok(AuthProof::for_challenge(challenge, Authenticator::BiometricStrong)),
            Step::ApproveWeak => Ok(AuthProof::for_challenge(challenge, Authenticator::BiometricWeak)),
            Step::Forge => {
                let keys = bioseal::KeyManager::new(
                    bioseal::InMemoryKeyStore::new(),
                    bioseal::KeyConfig::default(),
                )
                .unwrap();
                let other = keys.cipher_for_encryption().unwrap();
                Ok(AuthProof::for_challenge(other.challenge(), Authenticator::BiometricStrong))
            }
            Step::Fail(err) => Err(err),
        }
    }
}

/// Authorize a pending operation synchronously, as a callback-style platform would.
pub fn approve(pending: PendingAuth) -> AuthorizedCipher {
    let proof = AuthProof::for_challenge(pending.challenge(), Authenticator::BiometricStrong);
    pending.authorize(&proof).unwrap()
}
