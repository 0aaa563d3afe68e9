//! Error types for the dispatch core.

use carousel_core::UpstreamError;
use carousel_providers::RegistryError;

/// Terminal dispatch failures.
///
/// Individual upstream failures are recovered inside the dispatch loop and
/// never surface here; only exhaustion does.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Zero active providers at dispatch time
    #[error("No AI providers configured")]
    NoProviders,

    /// Every (provider, model) attempt failed
    #[error("{}", .last.as_ref().map(ToString::to_string).unwrap_or_else(|| "All providers failed".to_string()))]
    AllFailed {
        /// The last upstream error observed before exhaustion
        last: Option<UpstreamError>,
    },

    /// The registry could not be consulted
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DispatchError {
    /// Message of the last observed upstream error, for the client body.
    #[must_use]
    pub fn last_message(&self) -> String {
        match self {
            Self::AllFailed { last: Some(err) } => err.to_string(),
            Self::AllFailed { last: None } => "All providers failed".to_string(),
            other => other.to_string(),
        }
    }
}
