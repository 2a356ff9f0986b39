//! Configuration.
//!
//! Everything has a default matching the stock behaviour, so an empty JSON
//! object is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BiosealError, Result};
use crate::keys::KeyConfig;
use crate::prompt::PromptInfo;

/// Top-level configuration for a [`BiometricSession`](crate::session::BiometricSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricConfig {
    /// Alias and invalidation policy of the biometric key.
    pub key: KeyConfig,
    /// Prompt shown when turning protection on.
    pub enable_prompt: PromptInfo,
    /// Prompt shown when unlocking the token.
    pub authenticate_prompt: PromptInfo,
}

impl Default for BiometricConfig {
    fn default() -> Self {
        Self {
            key: KeyConfig::default(),
            enable_prompt: PromptInfo::for_enable(),
            authenticate_prompt: PromptInfo::for_authenticate(),
        }
    }
}

impl BiometricConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| BiosealError::Config(err.to_string()))
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref()).map_err(|err| {
            BiosealError::Config(format!("{}: {err}", path.as_ref().display()))
        })?;
        Self::from_json_str(&json)
    }
}
