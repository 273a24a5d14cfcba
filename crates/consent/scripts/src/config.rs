//! Loader configuration.

use consent_types::ScriptTarget;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of deterministic (non-anonymized) element identities.
pub const DEFAULT_ID_PREFIX: &str = "consent-script-";

/// Length of generated anonymized identities.
pub const DEFAULT_TOKEN_LENGTH: usize = 8;

const TOKEN_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=32;

/// Complete loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    pub identity: IdentityConfig,
    /// Insertion point for scripts that do not name one.
    pub default_target: ScriptTarget,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            default_target: ScriptTarget::Head,
        }
    }
}

/// Element identity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdentityConfig {
    pub prefix: String,
    pub token_length: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_ID_PREFIX.to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON, [`ConfigError::Invalid`]
    /// when the parsed values fail [`LoaderConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the identity settings produce usable element ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.identity.prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Invalid("identity prefix must not be empty".into()));
        }
        if !prefix.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid(format!(
                "identity prefix `{prefix}` must start with an ASCII letter"
            )));
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "identity prefix `{prefix}` may only contain ASCII letters, digits, `-` and `_`"
            )));
        }
        if !TOKEN_LENGTH_RANGE.contains(&self.identity.token_length) {
            return Err(ConfigError::Invalid(format!(
                "token length {} outside {}..={}",
                self.identity.token_length,
                TOKEN_LENGTH_RANGE.start(),
                TOKEN_LENGTH_RANGE.end()
            )));
        }
        Ok(())
    }
}
