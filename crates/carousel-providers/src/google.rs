//! Google Gemini adapter.
//!
//! Gemini's wire model separates the system prompt (`systemInstruction`)
//! from the conversation turns, and names the assistant role `model`.

use crate::adapter::UpstreamAdapter;
use async_stream::try_stream;
use async_trait::async_trait;
use carousel_core::{ChatMessage, ChatRole, TextStream, UpstreamError};
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Adapter for the Gemini `streamGenerateContent` API.
pub struct GeminiAdapter {
    provider_key: String,
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl GeminiAdapter {
    /// Create an adapter bound to one (provider, model) pair.
    ///
    /// # Errors
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        provider_key: &str,
        base_url: String,
        api_key: SecretString,
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
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

/// Split messages into Gemini turns plus an optional system instruction.
///
/// System messages are joined with newlines; user turns keep role `user`
/// and assistant turns become role `model`.
fn to_gemini_request(messages: &[ChatMessage]) -> GeminiRequest {
    let mut contents = Vec::new();
    let mut system_lines: Vec<&str> = Vec::new();

    for message in messages {
        match message.role {
            ChatRole::System => system_lines.push(&message.content),
            ChatRole::User => contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            }),
            ChatRole::Assistant => contents.push(GeminiContent {
                role: Some("model".to_string()),
                parts: vec![GeminiPart {
                    text: message.content.clone(),
                }],
            }),
        }
    }

    let system_instruction = if system_lines.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: system_lines.join("\n"),
            }],
        })
    };

    GeminiRequest {
        contents,
        system_instruction,
    }
}

/// Text carried by one streamed response payload.
fn candidate_text(data: &str) -> Result<String, serde_json::Error> {
    let response: GeminiResponse = serde_json::from_str(data)?;
    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default())
}

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
impl UpstreamAdapter for GeminiAdapter {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<TextStream, UpstreamError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url,
            self.model,
            self.api_key.expose_secret()
        );
        let body = to_gemini_request(messages);

        debug!(
            provider = %self.provider_key,
            model = %self.model,
            "Sending streaming generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
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

                while let Some(pos) = buffer.find("\n\n") {
                    let event = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();

                    for line in event.lines() {
                        if let Some(data) = line.strip_prefix("data: ") {
                            let text = candidate_text(data)
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
