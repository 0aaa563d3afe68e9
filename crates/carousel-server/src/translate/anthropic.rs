//! Anthropic-dialect translation.
//!
//! Streaming output is the fixed `message_start` … `message_stop` event
//! sequence; non-streaming output is a single `Message` object. Inbound
//! content may be a plain string or a list of content blocks.

use crate::error::{ApiError, Dialect};
use crate::translate::{estimate_tokens, hex_token};
use async_stream::stream;
use axum::{
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use carousel_core::{ChatMessage, ChatResult, ChatRole};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tracing::{error, warn};

/// An Anthropic-style messages request body.
///
/// `max_tokens` is required on `/v1/messages` for protocol conformance but
/// never forwarded upstream; sampling parameters are accepted and ignored
/// the same way.
#[derive(Debug, Deserialize)]
pub struct MessagesRequest {
    /// Requested model; routing is not model-sensitive
    #[serde(default)]
    pub model: Option<String>,
    /// Conversation turns
    pub messages: Vec<InboundMessage>,
    /// Optional top-level system prompt
    #[serde(default)]
    pub system: Option<ContentField>,
    /// Required by the protocol; accepted and ignored
    #[serde(default)]
    pub max_tokens: Option<u64>,
    /// Stream the response when true
    #[serde(default)]
    pub stream: bool,
    /// Accepted and ignored
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Accepted and ignored
    #[serde(default)]
    pub top_p: Option<f64>,
}

/// One inbound conversation turn.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    /// `user` or `assistant`
    pub role: String,
    /// Plain string or content-block list
    pub content: ContentField,
}

/// String-or-blocks content.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentField {
    /// Plain text
    Text(String),
    /// Content-block list; only `text` blocks are kept
    Blocks(Vec<ContentBlock>),
}

/// One content block.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    /// Block type; anything but `text` is dropped
    #[serde(rename = "type")]
    pub block_type: String,
    /// Text payload for `text` blocks
    #[serde(default)]
    pub text: Option<String>,
}

/// Flatten string-or-blocks content: `text` blocks joined with newlines.
fn flatten(content: &ContentField) -> String {
    match content {
        ContentField::Text(text) => text.clone(),
        ContentField::Blocks(blocks) => blocks
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Normalize an Anthropic request into internal chat messages.
///
/// A top-level `system` field is prepended as a system message.
#[must_use]
pub fn normalize(request: &MessagesRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(ChatMessage::system(flatten(system)));
    }
    for inbound in &request.messages {
        let role = match inbound.role.as_str() {
            "assistant" => ChatRole::Assistant,
            "system" => ChatRole::System,
            _ => ChatRole::User,
        };
        messages.push(ChatMessage {
            role,
            content: flatten(&inbound.content),
        });
    }
    messages
}

/// Mint a message id (`msg_` + 24 hex).
fn message_id() -> String {
    format!("msg_{}", hex_token(24))
}

fn event(name: &str, data: serde_json::Value) -> Event {
    Event::default().event(name).data(data.to_string())
}

/// Stream a validated dispatch result as the Anthropic event sequence.
pub fn sse_response(result: ChatResult, model: String) -> Response {
    let id = message_id();

    let frames = stream! {
        yield Ok::<_, Infallible>(event(
            "message_start",
            json!({
                "type": "message_start",
                "message": {
                    "id": id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": model,
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": {"input_tokens": 0, "output_tokens": 0},
                },
            }),
        ));
        yield Ok(event(
            "content_block_start",
            json!({
                "type": "content_block_start",
                "index": 0,
                "content_block": {"type": "text", "text": ""},
            }),
        ));

        let mut output_tokens: u64 = 0;
        let mut upstream = result.stream;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    output_tokens += estimate_tokens(&chunk);
                    yield Ok(event(
                        "content_block_delta",
                        json!({
                            "type": "content_block_delta",
                            "index": 0,
                            "delta": {"type": "text_delta", "text": chunk},
                        }),
                    ));
                }
                Err(err) => {
                    warn!(error = %err, "Upstream stream failed mid-flight");
                    yield Ok(event(
                        "error",
                        json!({
                            "type": "error",
                            "error": {"type": "api_error", "message": err.to_string()},
                        }),
                    ));
                    return;
                }
            }
        }

        yield Ok(event(
            "content_block_stop",
            json!({"type": "content_block_stop", "index": 0}),
        ));
        yield Ok(event(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {"stop_reason": "end_turn", "stop_sequence": null},
                "usage": {"output_tokens": output_tokens},
            }),
        ));
        yield Ok(event("message_stop", json!({"type": "message_stop"})));
    };

    Sse::new(frames)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Collect a validated dispatch result into a single `Message` object.
///
/// # Errors
/// Returns an internal error if the upstream fails mid-collection.
pub async fn json_response(result: ChatResult, model: String) -> Result<Response, ApiError> {
    let mut upstream = result.stream;
    let mut text = String::new();
    while let Some(item) = upstream.next().await {
        match item {
            Ok(chunk) => text.push_str(&chunk),
            Err(err) => {
                error!(error = %err, "Upstream stream failed during collection");
                return Err(ApiError::internal(Dialect::Anthropic));
            }
        }
    }

    let output_tokens = estimate_tokens(&text);
    Ok(Json(json!({
        "id": message_id(),
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": model,
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": 0, "output_tokens": output_tokens},
    }))
    .into_response())
}
