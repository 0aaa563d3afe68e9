//! The internal chunk-stream abstraction and the dispatch result.

use crate::error::UpstreamError;
use futures::stream::BoxStream;

/// Lazy, single-pass sequence of text fragments from an upstream.
///
/// Iteration suspends between chunks; dropping the stream releases the
/// underlying connection. Errors surface at the poll that observes them.
pub type TextStream = BoxStream<'static, Result<String, UpstreamError>>;

/// A validated dispatch result.
///
/// Handed out only after the first chunk has been observed non-empty on the
/// upstream, so the stream is guaranteed to yield at least one fragment.
/// Consumed exactly once.
pub struct ChatResult {
    /// The validated chunk stream, beginning with the already-observed
    /// first fragment
    pub stream: TextStream,
    /// Human-readable name of the provider that served the request
    pub service_name: String,
    /// Model that produced the stream
    pub model: String,
    /// Stable provider key
    pub provider_key: String,
}

impl std::fmt::Debug for ChatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResult")
            .field("service_name", &self.service_name)
            .field("model", &self.model)
            .field("provider_key", &self.provider_key)
            .finish_non_exhaustive()
    }
}
