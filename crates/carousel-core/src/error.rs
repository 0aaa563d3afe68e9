//! Shared error type for upstream attempts.

/// Failure of a single upstream attempt.
///
/// The dispatch core treats every variant uniformly: the (provider, model)
/// pair failed and the next fallback candidate is tried. The variants exist
/// for diagnostics only.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// Network-level failure reaching the upstream
    #[error("{provider}: transport error: {message}")]
    Transport {
        /// Provider key the attempt targeted
        provider: String,
        /// Underlying error description
        message: String,
    },

    /// Upstream answered with a non-success status
    #[error("{provider}: upstream returned {status}: {message}")]
    Status {
        /// Provider key the attempt targeted
        provider: String,
        /// HTTP status code
        status: u16,
        /// Error body or description
        message: String,
    },

    /// Upstream payload could not be decoded
    #[error("{provider}: invalid upstream payload: {message}")]
    Decode {
        /// Provider key the attempt targeted
        provider: String,
        /// Decode failure description
        message: String,
    },

    /// Stream ended before producing any content
    #[error("{provider}: upstream produced an empty response")]
    EmptyStream {
        /// Provider key the attempt targeted
        provider: String,
    },

    /// First chunk did not arrive within the deadline
    #[error("{provider}: timed out waiting for the first chunk")]
    FirstChunkTimeout {
        /// Provider key the attempt targeted
        provider: String,
    },

    /// Adapter could not be constructed for the provider
    #[error("{provider}: adapter configuration error: {message}")]
    Configuration {
        /// Provider key the attempt targeted
        provider: String,
        /// Configuration problem description
        message: String,
    },
}

impl UpstreamError {
    /// Build a transport error
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build a status error
    pub fn status(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Build a decode error
    pub fn decode(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build an empty-stream error
    pub fn empty_stream(provider: impl Into<String>) -> Self {
        Self::EmptyStream {
            provider: provider.into(),
        }
    }

    /// Build a first-chunk timeout error
    pub fn first_chunk_timeout(provider: impl Into<String>) -> Self {
        Self::FirstChunkTimeout {
            provider: provider.into(),
        }
    }

    /// Build a configuration error
    pub fn configuration(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Provider key the failed attempt targeted
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Decode { provider, .. }
            | Self::EmptyStream { provider }
            | Self::FirstChunkTimeout { provider }
            | Self::Configuration { provider, .. } => provider,
        }
    }
}
