//! OpenAI-dialect translation.
//!
//! Streaming output is a sequence of `data: <json>` frames terminated by
//! a single `data: [DONE]`; non-streaming output is one completion object.

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
use carousel_core::ChatResult;
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;
use tracing::{error, warn};

/// Mint a completion id (`chatcmpl-` + 24 hex).
fn completion_id() -> String {
    format!("chatcmpl-{}", hex_token(24))
}

/// One chunk frame body. Middles carry a null `finish_reason`.
fn chunk_frame(
    id: &str,
    created: i64,
    model: &str,
    delta: serde_json::Value,
    finish_reason: Option<&str>,
) -> String {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason,
        }],
    })
    .to_string()
}

/// Stream a validated dispatch result as OpenAI SSE.
///
/// The first frame's delta carries the assistant role; the final frame
/// before `[DONE]` has an empty delta and `finish_reason: "stop"`.
pub fn sse_response(result: ChatResult, model: String) -> Response {
    let id = completion_id();
    let created = Utc::now().timestamp();

    let frames = stream! {
        let mut upstream = result.stream;
        let mut first = true;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    let delta = if first {
                        json!({"role": "assistant", "content": chunk})
                    } else {
                        json!({"content": chunk})
                    };
                    first = false;
                    yield Ok::<_, Infallible>(
                        Event::default().data(chunk_frame(&id, created, &model, delta, None)),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "Upstream stream failed mid-flight");
                    let body = json!({
                        "error": {"message": err.to_string(), "type": "api_error"}
                    });
                    yield Ok(Event::default().data(body.to_string()));
                    yield Ok(Event::default().data("[DONE]"));
                    return;
                }
            }
        }
        yield Ok(Event::default().data(chunk_frame(&id, created, &model, json!({}), Some("stop"))));
        yield Ok(Event::default().data("[DONE]"));
    };

    Sse::new(frames)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Collect a validated dispatch result into a single completion object.
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
                return Err(ApiError::internal(Dialect::OpenAi));
            }
        }
    }

    let completion_tokens = estimate_tokens(&text);
    Ok(Json(json!({
        "id": completion_id(),
        "object": "chat.completion",
        "created": Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": 0,
            "completion_tokens": completion_tokens,
            "total_tokens": completion_tokens,
        },
    }))
    .into_response())
}
