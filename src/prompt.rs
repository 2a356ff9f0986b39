//! The external biometric prompt capability.
//!
//! bioseal does not draw any UI. It hands the platform an
//! [`OperationChallenge`] that identifies one specific cipher instance, and
//! the platform resolves it to either an [`AuthProof`] for that instance or a
//! [`PromptError`]. How the prompt looks is described by [`PromptInfo`], which
//! is configuration rather than core behaviour.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cipher::OperationKind;

/// Length of the per-operation challenge identifier.
pub const CHALLENGE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Prompt configuration
// ---------------------------------------------------------------------------

/// Minimum authenticator class accepted by a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authenticator {
    /// Class 3 biometrics. Required for keys bound to per-use authentication.
    #[default]
    BiometricStrong,
    /// Class 2 biometrics.
    BiometricWeak,
}

/// What the secondary action of the prompt offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Fallback {
    /// A dismiss button with the given label. Pressing it yields
    /// [`PromptError::NegativeButton`].
    NegativeButton {
        /// Button label.
        text: String,
    },
    /// Allow the device PIN/pattern/password instead of a biometric.
    DeviceCredential,
}

impl Default for Fallback {
    fn default() -> Self {
        Self::NegativeButton {
            text: "Cancel".to_string(),
        }
    }
}

/// Presentation and policy options for one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptInfo {
    /// Prompt heading.
    pub title: String,
    /// Line shown under the title.
    pub subtitle: Option<String>,
    /// Longer explanation, if any.
    pub description: Option<String>,
    /// Require an explicit confirm tap after passive biometrics (face).
    pub confirmation_required: bool,
    /// Weakest authenticator whose proof is accepted.
    pub min_strength: Authenticator,
    /// Secondary action offered next to the biometric.
    pub fallback: Fallback,
}

impl Default for PromptInfo {
    fn default() -> Self {
        Self::new("Biometric Authentication")
    }
}

impl PromptInfo {
    /// A prompt with `title`, strong biometrics and a "Cancel" button.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            description: None,
            confirmation_required: false,
            min_strength: Authenticator::BiometricStrong,
            fallback: Fallback::default(),
        }
    }

    /// Prompt shown when protection is being turned on.
    pub fn for_enable() -> Self {
        Self::new("Enable Biometric Authentication")
            .with_subtitle("Confirm to enable biometric authentication")
    }

    /// Prompt shown when the protected token is being unlocked.
    pub fn for_authenticate() -> Self {
        Self::new("Biometric Authentication").with_subtitle("Authenticate to log in")
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_confirmation_required(mut self, required: bool) -> Self {
        self.confirmation_required = required;
        self
    }

    pub fn with_min_strength(mut self, strength: Authenticator) -> Self {
        self.min_strength = strength;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }
}

// ---------------------------------------------------------------------------
// Challenge and proof
// ---------------------------------------------------------------------------

/// Identifies exactly one cipher instance awaiting authorization.
///
/// A fresh random identifier is drawn every time a cipher is built, so a
/// proof obtained for one operation can never authorize another.
#[derive(Clone, PartialEq, Eq)]
pub struct OperationChallenge {
    kind: OperationKind,
    id: [u8; CHALLENGE_LEN],
}

impl OperationChallenge {
    pub(crate) fn new(kind: OperationKind, id: [u8; CHALLENGE_LEN]) -> Self {
        Self { kind, id }
    }

    /// The operation the cipher was initialised for.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Random identifier of the cipher instance.
    pub fn id(&self) -> &[u8; CHALLENGE_LEN] {
        &self.id
    }
}

impl fmt::Debug for OperationChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationChallenge")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Evidence from the platform that the user passed a biometric check for a
/// specific [`OperationChallenge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProof {
    challenge_id: [u8; CHALLENGE_LEN],
    authenticator: Authenticator,
}

impl AuthProof {
    /// Build the proof for `challenge`. Only the platform prompt should call
    /// this, and only after a successful check.
    pub fn for_challenge(challenge: &OperationChallenge, authenticator: Authenticator) -> Self {
        Self {
            challenge_id: challenge.id,
            authenticator,
        }
    }

    /// Class of the biometric that was presented.
    pub fn authenticator(&self) -> Authenticator {
        self.authenticator
    }

    pub(crate) fn matches(&self, challenge: &OperationChallenge) -> bool {
        self.challenge_id == challenge.id
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Non-success outcomes of a biometric prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// The user dismissed the prompt.
    #[error("authentication cancelled")]
    UserCanceled,
    /// The user pressed the negative button.
    #[error("authentication cancelled")]
    NegativeButton,
    /// The prompt timed out waiting for the user.
    #[error("authentication timed out")]
    Timeout,
    /// The system cancelled the prompt (e.g. the app lost focus).
    #[error("authentication cancelled by the system")]
    Canceled,
    /// The biometric was presented but not recognised.
    #[error("Authentication failed")]
    Failed,
    /// Too many attempts; temporarily locked.
    #[error("too many attempts, try again later")]
    Lockout,
    /// Too many attempts; biometrics disabled until device credential is used.
    #[error("too many attempts, biometric authentication is locked")]
    LockoutPermanent,
    /// The sensor is busy or unavailable.
    #[error("biometric hardware unavailable")]
    HardwareUnavailable,
    /// Any other platform error.
    #[error("Authentication error: {message}")]
    Other {
        code: i32,
        message: String,
    },
}

impl PromptError {
    /// Map an Android `BiometricPrompt.ERROR_*` code to a variant.
    pub fn from_code(code: i32, message: impl Into<String>) -> Self {
        match code {
            1 => Self::HardwareUnavailable,
            3 => Self::Timeout,
            5 => Self::Canceled,
            7 => Self::Lockout,
            9 => Self::LockoutPermanent,
            10 => Self::UserCanceled,
            13 => Self::NegativeButton,
            _ => Self::Other {
                code,
                message: message.into(),
            },
        }
    }

    /// True for outcomes that abort silently with no state change.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::UserCanceled | Self::NegativeButton | Self::Timeout)
    }
}

/// Result of asking the device whether it can authenticate right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    StatusUnknown,
    Unsupported,
    HardwareUnavailable,
    NoneEnrolled,
    NoHardware,
    SecurityUpdateRequired,
    IdentityCheckNotActive,
}

impl Availability {
    /// True only for [`Availability::Available`].
    pub fn is_available(self) -> bool {
        self == Self::Available
    }

    /// User-facing explanation.
    pub fn message(self) -> &'static str {
        match self {
            Self::Available => "Biometric authentication is available.",
            Self::StatusUnknown => "Something went wrong with the biometric sensor.",
            Self::Unsupported => "Biometric authentication isn't supported on this device.",
            Self::HardwareUnavailable => "Biometric sensor is currently unavailable.",
            Self::NoneEnrolled => "No biometric credentials are enrolled.",
            Self::NoHardware => "This device doesn't have a biometric sensor.",
            Self::SecurityUpdateRequired => "Security update is required to use this feature.",
            Self::IdentityCheckNotActive => "Identity check is currently inactive.",
        }
    }
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// Platform biometric prompt.
///
/// `authenticate` suspends until the user interacts with the prompt. An
/// implementation must only return an [`AuthProof`] built from the challenge
/// it was given, after a successful biometric check of at least
/// `info.min_strength`.
#[allow(async_fn_in_trait)]
pub trait BiometricPrompt {
    /// Whether an authenticator of `min_strength` can be used right now.
    fn can_authenticate(&self, min_strength: Authenticator) -> Availability;

    /// Show the prompt for `challenge` and wait for the outcome.
    async fn authenticate(
        &self,
        info: &PromptInfo,
        challenge: &OperationChallenge,
    ) -> Result<AuthProof, PromptError>;
}
