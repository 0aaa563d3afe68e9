//! The adapter seam between the dispatch core and vendor SDKs.

use crate::descriptor::{descriptor, AdapterKind};
use crate::google::GeminiAdapter;
use crate::openai_compat::OpenAiCompatAdapter;
use crate::registry::ActiveProvider;
use async_trait::async_trait;
use carousel_core::{ChatMessage, TextStream, UpstreamError};
use secrecy::SecretString;

/// A single upstream attempt target, bound to one (provider, model) pair.
///
/// `chat` either fails synchronously or returns a lazy chunk sequence whose
/// errors surface at the poll that observes them. Empty fragments are yielded
/// as empty strings.
#[async_trait]
pub trait UpstreamAdapter: Send + Sync {
    /// Start a chat completion and return its chunk stream.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<TextStream, UpstreamError>;
}

/// Builds an adapter for a (provider, model) pair.
pub trait AdapterFactory: Send + Sync {
    /// Construct the adapter; fails when the provider's configuration is
    /// unusable (counts as a failed attempt for that pair).
    fn build(
        &self,
        provider: &ActiveProvider,
        model: &str,
    ) -> Result<Box<dyn UpstreamAdapter>, UpstreamError>;
}

/// The production factory: maps a provider's descriptor kind onto the
/// concrete adapter variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkFactory;

impl SdkFactory {
    /// Create the factory.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AdapterFactory for SdkFactory {
    fn build(
        &self,
        provider: &ActiveProvider,
        model: &str,
    ) -> Result<Box<dyn UpstreamAdapter>, UpstreamError> {
        let descriptor = descriptor(&provider.key).ok_or_else(|| {
            UpstreamError::configuration(&provider.key, "provider is not known to this build")
        })?;

        let api_key = std::env::var(descriptor.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(SecretString::new);

        match descriptor.kind {
            AdapterKind::OpenAiCompat => {
                let api_key = api_key.ok_or_else(|| {
                    UpstreamError::configuration(
                        &provider.key,
                        format!("{} is not set", descriptor.api_key_env),
                    )
                })?;
                Ok(Box::new(OpenAiCompatAdapter::new(
                    &provider.key,
                    descriptor.resolved_base_url(),
                    Some(api_key),
                    model,
                )?))
            }
            AdapterKind::LocalHttp => Ok(Box::new(OpenAiCompatAdapter::new(
                &provider.key,
                descriptor.resolved_base_url(),
                api_key,
                model,
            )?)),
            AdapterKind::Google => {
                let api_key = api_key.ok_or_else(|| {
                    UpstreamError::configuration(
                        &provider.key,
                        format!("{} is not set", descriptor.api_key_env),
                    )
                })?;
                Ok(Box::new(GeminiAdapter::new(
                    &provider.key,
                    descriptor.resolved_base_url(),
                    api_key,
                    model,
                )?))
            }
        }
    }
}
