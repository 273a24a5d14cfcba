use consent_condition::ConditionError;
use thiserror::Error;

use crate::script::CallbackSlot;

/// Error type returned by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of every script callback and environment listener.
pub type CallbackResult = Result<(), CallbackError>;

/// Errors from script lifecycle operations.
///
/// All variants abort processing at the offending script. Scripts handled
/// earlier in the same call keep their effects.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("script `{id}` has an invalid condition: {source}")]
    Condition {
        id: String,
        #[source]
        source: ConditionError,
    },

    #[error("script `{id}` has an invalid content source: {reason}")]
    InvalidSource { id: String, reason: String },

    #[error("script `{id}`: {slot} callback failed: {source}")]
    Callback {
        id: String,
        slot: CallbackSlot,
        #[source]
        source: CallbackError,
    },
}

impl LoaderError {
    /// Id of the script the error was raised for.
    pub fn script_id(&self) -> &str {
        match self {
            LoaderError::Condition { id, .. }
            | LoaderError::InvalidSource { id, .. }
            | LoaderError::Callback { id, .. } => id,
        }
    }
}

/// Errors from loader configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid loader configuration: {0}")]
    Invalid(String),

    #[error("failed to parse loader configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
