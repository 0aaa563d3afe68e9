//! HTTP request handlers.

use crate::error::{ApiError, Dialect};
use crate::state::AppState;
use crate::translate::{anthropic, openai};
use crate::SERVICE_NAME;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, Uri},
    response::{IntoResponse, Response},
    Json,
};
use carousel_core::ChatMessage;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Models advertised by `/v1/models`. Routing is not model-sensitive; the
/// aliases exist for client compatibility only.
const ADVERTISED_MODELS: &[&str] = &[
    SERVICE_NAME,
    "gpt-4",
    "gpt-3.5-turbo",
    "claude-3-5-sonnet-20241022",
];

/// Health check endpoint
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "service": SERVICE_NAME}))
}

/// List models endpoint (OpenAI compatible)
pub async fn list_models() -> Json<Value> {
    let data: Vec<Value> = ADVERTISED_MODELS
        .iter()
        .map(|id| model_object(id))
        .collect();
    Json(json!({"object": "list", "data": data}))
}

/// Get model endpoint; echoes the requested id
pub async fn get_model(Path(model_id): Path<String>) -> Json<Value> {
    Json(model_object(&model_id))
}

fn model_object(id: &str) -> Value {
    json!({
        "id": id,
        "object": "model",
        "created": 0,
        "owned_by": SERVICE_NAME,
    })
}

/// An OpenAI-style chat completion request.
///
/// Sampling parameters are accepted for compatibility and ignored; model
/// selection comes from the models configuration, not the request.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionsRequest {
    /// Requested model, echoed back in responses
    #[serde(default)]
    pub model: Option<String>,
    /// Conversation messages, passed through unchanged
    pub messages: Vec<ChatMessage>,
    /// Defaults to streaming when absent
    #[serde(default)]
    pub stream: Option<bool>,
    /// Accepted and ignored
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Accepted and ignored
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Accepted and ignored
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

/// Chat completion endpoint (OpenAI compatible)
#[instrument(skip(state, body))]
pub async fn chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ChatCompletionsRequest = serde_json::from_slice(&body).map_err(|e| {
        ApiError::invalid_request(Dialect::OpenAi, format!("Invalid request body: {e}"))
    })?;

    let model = request.model.unwrap_or_else(|| SERVICE_NAME.to_string());
    let streaming = request.stream.unwrap_or(true);

    debug!(model = %model, streaming, "Processing chat completion request");

    let result = state
        .chat
        .dispatch(&request.messages)
        .await
        .map_err(|e| ApiError::from_dispatch(Dialect::OpenAi, &e))?;

    if streaming {
        Ok(openai::sse_response(result, model))
    } else {
        openai::json_response(result, model).await
    }
}

/// Messages endpoint (Anthropic compatible)
#[instrument(skip(state, body))]
pub async fn messages(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: anthropic::MessagesRequest = serde_json::from_slice(&body).map_err(|e| {
        ApiError::invalid_request(Dialect::Anthropic, format!("Invalid request body: {e}"))
    })?;

    if request.max_tokens.is_none() {
        return Err(ApiError::invalid_request(
            Dialect::Anthropic,
            "max_tokens is required",
        ));
    }

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| SERVICE_NAME.to_string());
    let normalized = anthropic::normalize(&request);

    debug!(model = %model, streaming = request.stream, "Processing messages request");

    let result = state
        .chat
        .dispatch(&normalized)
        .await
        .map_err(|e| ApiError::from_dispatch(Dialect::Anthropic, &e))?;

    if request.stream {
        Ok(anthropic::sse_response(result, model))
    } else {
        anthropic::json_response(result, model).await
    }
}

/// Token counting endpoint (Anthropic compatible)
pub async fn count_tokens(body: Bytes) -> Result<Json<Value>, ApiError> {
    let request: anthropic::MessagesRequest = serde_json::from_slice(&body).map_err(|e| {
        ApiError::invalid_request(Dialect::Anthropic, format!("Invalid request body: {e}"))
    })?;

    if request.max_tokens.is_none() {
        return Err(ApiError::invalid_request(
            Dialect::Anthropic,
            "max_tokens is required",
        ));
    }

    let normalized = anthropic::normalize(&request);
    let total_chars: usize = normalized
        .iter()
        .map(|m| m.content.chars().count())
        .sum();

    Ok(Json(json!({
        "input_tokens": (total_chars as u64).div_ceil(4)
    })))
}

/// Raw chat endpoint: a JSON array of messages in, the unframed chunk
/// stream out.
#[instrument(skip(state, body))]
pub async fn raw_chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let messages: Vec<ChatMessage> = serde_json::from_slice(&body).map_err(|e| {
        ApiError::invalid_request(Dialect::OpenAi, format!("Invalid request body: {e}"))
    })?;

    let result = state
        .chat
        .dispatch(&messages)
        .await
        .map_err(|e| ApiError::from_dispatch(Dialect::OpenAi, &e))?;

    let body = Body::from_stream(result.stream.map_ok(Bytes::from));
    Ok((
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response())
}

/// Unknown-route fallback with a dialect-matched body
pub async fn fallback(uri: Uri) -> ApiError {
    ApiError::not_found(Dialect::for_path(uri.path()))
}
