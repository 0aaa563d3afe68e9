//! Error types for the models configuration store.

use std::path::PathBuf;

/// Errors reported by [`crate::ModelsStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist
    #[error("models configuration not found at {0}")]
    NotFound(PathBuf),

    /// Filesystem failure reading or replacing the file
    #[error("models configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not valid JSON
    #[error("models configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A document or mutation violated a configuration constraint
    #[error("invalid models configuration: {0}")]
    Validation(String),

    /// The named provider has no entry in the document
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The model is already present for the provider
    #[error("model {model} already configured for {provider}")]
    DuplicateModel {
        /// Provider key
        provider: String,
        /// Offending model name
        model: String,
    },

    /// The model is not present for the provider
    #[error("model {model} not configured for {provider}")]
    ModelNotFound {
        /// Provider key
        provider: String,
        /// Missing model name
        model: String,
    },

    /// Removal would delete the provider's default model
    #[error("cannot remove {model}: it is the default model for {provider}")]
    DefaultRemoval {
        /// Provider key
        provider: String,
        /// Protected model name
        model: String,
    },

    /// Removal would leave the provider with no models
    #[error("cannot remove {model}: it is the only model configured for {provider}")]
    SoleModelRemoval {
        /// Provider key
        provider: String,
        /// Protected model name
        model: String,
    },

    /// A reorder request was not a permutation of the current model list
    #[error("reorder for {provider} must be a permutation of the current models")]
    InvalidReorder {
        /// Provider key
        provider: String,
    },
}

impl ConfigError {
    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
