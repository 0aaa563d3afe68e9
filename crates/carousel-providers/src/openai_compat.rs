//! OpenAI-style `/chat/completions` adapter.
//!
//! Covers the hosted providers (Cerebras, Groq, OpenRouter) and, with a
//! local base URL and optional key, the local-HTTP variant.

use crate::adapter::UpstreamAdapter;
use async_stream::try_stream;
use async_trait::async_trait;
use carousel_core::{ChatMessage, TextStream, UpstreamError};
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Adapter for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiCompatAdapter {
    provider_key: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiCompatAdapter {
    /// Create an adapter bound to one (provider, model) pair.
    ///
    /// # Errors
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        provider_key: &str,
        base_url: String,
        api_key: Option<SecretString>,
        model: &str,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                UpstreamError::configuration(
                    provider_key,
                    format!("failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            provider_key: provider_key.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Text fragment carried by one `data:` payload. Missing content (e.g. a
/// role-only first delta) comes back as the empty string.
fn delta_text(data: &str) -> Result<String, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default())
}

/// Pull a human-readable message out of an error body, falling back to the
/// raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl UpstreamAdapter for OpenAiCompatAdapter {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<TextStream, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = WireRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        debug!(
            provider = %self.provider_key,
            model = %self.model,
            url = %url,
            "Sending streaming chat completion request"
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::transport(&self.provider_key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::status(
                &self.provider_key,
                status.as_u16(),
                error_message(&body),
            ));
        }

        let provider = self.provider_key.clone();
        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result
                    .map_err(|e| UpstreamError::transport(&provider, e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE events
                while let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();

                    for line in event.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            if data == "[DONE]" {
                                return;
                            }
                            let text = delta_text(data)
                                .map_err(|e| UpstreamError::decode(&provider, e.to_string()))?;
                            yield text;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_text_extracts_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_text(data).expect("parse"), "Hel");
    }

    #[test]
    fn test_delta_text_role_only_is_empty() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(delta_text(data).expect("parse"), "");
    }

    #[test]
    fn test_delta_text_no_choices_is_empty() {
        assert_eq!(delta_text(r#"{"choices":[]}"#).expect("parse"), "");
    }

    #[test]
    fn test_delta_text_rejects_garbage() {
        assert!(delta_text("not json").is_err());
    }

    #[test]
    fn test_error_message_prefers_structured_body() {
        let body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
        assert_eq!(error_message(body), "model overloaded");
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_wire_request_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let request = WireRequest {
            model: "m1",
            messages: &messages,
            stream: true,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "m1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let adapter = OpenAiCompatAdapter::new(
            "groq",
            "https://api.groq.com/openai/v1/".to_string(),
            None,
            "m1",
        )
        .expect("adapter");
        assert_eq!(adapter.base_url, "https://api.groq.com/openai/v1");
    }
}
