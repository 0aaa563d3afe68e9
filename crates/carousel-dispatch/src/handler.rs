//! The dispatch algorithm.

use crate::error::DispatchError;
use async_trait::async_trait;
use carousel_core::{ChatMessage, ChatResult, UpstreamError};
use carousel_providers::{ActiveProvider, AdapterFactory, ProviderRegistry, RegistryError};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Source of the active provider set consulted on every dispatch.
#[async_trait]
pub trait ProviderSource: Send + Sync {
    /// The ordered list of providers eligible right now.
    async fn list_active(&self) -> Result<Vec<ActiveProvider>, RegistryError>;
}

#[async_trait]
impl ProviderSource for ProviderRegistry {
    async fn list_active(&self) -> Result<Vec<ActiveProvider>, RegistryError> {
        ProviderRegistry::list_active(self).await
    }
}

/// The dispatch core.
///
/// Holds the process-wide round-robin cursor. Concurrent dispatches may race
/// on the cursor; each read only needs to land on some valid index, so a
/// relaxed atomic suffices.
pub struct ChatHandler {
    providers: Arc<dyn ProviderSource>,
    factory: Arc<dyn AdapterFactory>,
    next_index: AtomicUsize,
    first_chunk_timeout: Duration,
}

impl ChatHandler {
    /// Deadline for the first chunk of each upstream attempt.
    pub const DEFAULT_FIRST_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a handler over a provider source and adapter factory.
    #[must_use]
    pub fn new(providers: Arc<dyn ProviderSource>, factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            providers,
            factory,
            next_index: AtomicUsize::new(0),
            first_chunk_timeout: Self::DEFAULT_FIRST_CHUNK_TIMEOUT,
        }
    }

    /// Override the first-chunk deadline.
    #[must_use]
    pub fn with_first_chunk_timeout(mut self, deadline: Duration) -> Self {
        self.first_chunk_timeout = deadline;
        self
    }

    /// Dispatch a chat request.
    ///
    /// Visits each active provider at most once, starting at the round-robin
    /// cursor; within a provider, each model at most once. The cursor
    /// advances only after a success, so a failing provider does not consume
    /// its slot.
    ///
    /// # Errors
    /// [`DispatchError::NoProviders`] when the active set is empty,
    /// [`DispatchError::AllFailed`] after exhaustion, or a registry error.
    pub async fn dispatch(&self, messages: &[ChatMessage]) -> Result<ChatResult, DispatchError> {
        let actives = self.providers.list_active().await?;
        if actives.is_empty() {
            warn!("Dispatch requested with no active providers");
            return Err(DispatchError::NoProviders);
        }

        let len = actives.len();
        let start = self.next_index.load(Ordering::Relaxed) % len;
        let mut last_err = None;

        for offset in 0..len {
            let provider = &actives[(start + offset) % len];
            match self.try_provider(provider, messages).await {
                Ok(result) => {
                    self.next_index
                        .store((start + offset + 1) % len, Ordering::Relaxed);
                    info!(
                        provider = %result.provider_key,
                        model = %result.model,
                        "Dispatch succeeded"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    warn!(provider = %provider.key, error = %err, "Provider failed, trying next");
                    last_err = Some(err);
                }
            }
        }

        Err(DispatchError::AllFailed { last: last_err })
    }

    /// Try one provider, walking its model fallback order.
    async fn try_provider(
        &self,
        provider: &ActiveProvider,
        messages: &[ChatMessage],
    ) -> Result<ChatResult, UpstreamError> {
        let mut candidates = vec![provider.default_model.clone()];
        if provider.enable_fallback {
            candidates.extend(
                provider
                    .models
                    .iter()
                    .filter(|m| **m != provider.default_model)
                    .cloned(),
            );
        }

        let mut last_err = None;
        for model in &candidates {
            match self.try_model(provider, model, messages).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    debug!(
                        provider = %provider.key,
                        model = %model,
                        error = %err,
                        "Model attempt failed"
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| UpstreamError::empty_stream(&provider.key)))
    }

    /// Try one (provider, model) pair, validating the first chunk.
    ///
    /// The caller only receives the stream once a non-empty first chunk has
    /// been observed; the captured chunk is prepended so the sequence still
    /// begins with it. Empty fragments are stripped during validation only.
    async fn try_model(
        &self,
        provider: &ActiveProvider,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResult, UpstreamError> {
        let adapter = self.factory.build(provider, model)?;
        let mut stream = adapter.chat(messages).await?;

        let first = loop {
            let step = timeout(self.first_chunk_timeout, stream.next())
                .await
                .map_err(|_| UpstreamError::first_chunk_timeout(&provider.key))?;
            match step {
                None => return Err(UpstreamError::empty_stream(&provider.key)),
                Some(Err(err)) => return Err(err),
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
            }
        };

        Ok(ChatResult {
            stream: futures::stream::once(async move { Ok(first) })
                .chain(stream)
                .boxed(),
            service_name: provider.name.clone(),
            model: model.to_string(),
            provider_key: provider.key.clone(),
        })
    }
}
