//! End-to-end tests for the aicarousel gateway HTTP surface.
//!
//! These tests validate the complete request path (auth middleware,
//! dispatch, translators, error bodies) using scripted upstream adapters
//! in place of real providers.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use carousel_core::{ChatMessage, TextStream, UpstreamError};
use carousel_dispatch::{ChatHandler, ProviderSource};
use carousel_providers::{ActiveProvider, AdapterFactory, RegistryError, UpstreamAdapter};
use carousel_server::{create_router, AppState};
use carousel_store::{apply_pending, connect_in_memory, CredentialStore};
use futures::StreamExt;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// What a scripted provider does when dispatched to.
#[derive(Clone)]
enum Script {
    Chunks(Vec<&'static str>),
    FailSync(&'static str),
    Empty,
}

struct ScriptedAdapter {
    provider: String,
    script: Script,
}

#[async_trait]
impl UpstreamAdapter for ScriptedAdapter {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<TextStream, UpstreamError> {
        match &self.script {
            Script::FailSync(message) => Err(UpstreamError::transport(&self.provider, *message)),
            Script::Empty => Ok(futures::stream::empty().boxed()),
            Script::Chunks(chunks) => Ok(futures::stream::iter(
                chunks
                    .iter()
                    .map(|c| Ok((*c).to_string()))
                    .collect::<Vec<_>>(),
            )
            .boxed()),
        }
    }
}

struct ScriptedFactory {
    scripts: HashMap<String, Script>,
}

impl AdapterFactory for ScriptedFactory {
    fn build(
        &self,
        provider: &ActiveProvider,
        _model: &str,
    ) -> Result<Box<dyn UpstreamAdapter>, UpstreamError> {
        let script = self
            .scripts
            .get(&provider.key)
            .cloned()
            .unwrap_or(Script::Empty);
        Ok(Box::new(ScriptedAdapter {
            provider: provider.key.clone(),
            script,
        }))
    }
}

struct FixedProviders(Vec<ActiveProvider>);

#[async_trait]
impl ProviderSource for FixedProviders {
    async fn list_active(&self) -> Result<Vec<ActiveProvider>, RegistryError> {
        Ok(self.0.clone())
    }
}

fn provider(key: &str) -> ActiveProvider {
    ActiveProvider {
        key: key.to_string(),
        name: format!("{key}-name"),
        models: vec!["m1".to_string()],
        default_model: "m1".to_string(),
        enable_fallback: false,
        priority: 0,
    }
}

/// Application state over scripted providers plus one valid API key.
async fn state_with(
    providers: Vec<ActiveProvider>,
    scripts: Vec<(&str, Script)>,
) -> (AppState, String) {
    let pool = connect_in_memory().await.expect("pool");
    apply_pending(&pool).await.expect("migrate");
    let credentials = CredentialStore::new(pool);
    let (plaintext, _) = credentials.create(Some("e2e")).await.expect("key");

    let factory = ScriptedFactory {
        scripts: scripts
            .into_iter()
            .map(|(k, s)| (k.to_string(), s))
            .collect(),
    };
    let handler = ChatHandler::new(Arc::new(FixedProviders(providers)), Arc::new(factory));

    (
        AppState::new(Arc::new(handler), credentials),
        plaintext,
    )
}

fn post_json(uri: &str, key: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

mod health_and_models {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "aicarousel");
    }

    #[tokio::test]
    async fn test_models_list_is_public() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["object"], "list");
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&"aicarousel"));
        assert!(ids.contains(&"gpt-4"));
        assert!(ids.contains(&"gpt-3.5-turbo"));
        assert!(ids.contains(&"claude-3-5-sonnet-20241022"));
    }

    #[tokio::test]
    async fn test_model_get_echoes_id() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/models/gpt-4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], "gpt-4");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (state, key) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/v1/nope", Some(&key), &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_openai_body() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                None,
                &json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["code"], "invalid_api_key");
        assert_eq!(body["error"]["message"], "Missing API key");
    }

    #[tokio::test]
    async fn test_missing_key_anthropic_body() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/messages",
                None,
                &json!({"messages": [], "max_tokens": 10}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "authentication_error");
        assert_eq!(body["error"]["message"], "Missing API key");
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some("sk-0000000000000000000000000000000000000000000000000000000000000000"),
                &json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Invalid API key");
    }

    #[tokio::test]
    async fn test_x_api_key_header_accepted() {
        let (state, key) =
            state_with(vec![provider("a")], vec![("a", Script::Chunks(vec!["x"]))]).await;
        let app = create_router(state);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &key)
            .body(Body::from(
                json!({
                    "messages": [{"role": "user", "content": "hi"}],
                    "max_tokens": 10
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

mod chat_completions {
    use super::*;

    fn data_payloads(body: &str) -> Vec<String> {
        body.split("\n\n")
            .filter(|frame| !frame.is_empty())
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_happy_openai_stream() {
        let (state, key) = state_with(
            vec![provider("a"), provider("b")],
            vec![
                ("a", Script::Chunks(vec!["Hel", "lo"])),
                ("b", Script::Chunks(vec!["from-b"])),
            ],
        )
        .await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({
                    "model": "aicarousel",
                    "messages": [{"role": "user", "content": "hi"}],
                    "stream": true
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let body = body_string(response).await;
        let payloads = data_payloads(&body);
        assert_eq!(payloads.len(), 4);

        let first: Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(first["choices"][0]["delta"]["content"], "Hel");
        let second: Value = serde_json::from_str(&payloads[1]).unwrap();
        assert_eq!(second["choices"][0]["delta"]["content"], "lo");
        let third: Value = serde_json::from_str(&payloads[2]).unwrap();
        assert_eq!(third["choices"][0]["finish_reason"], "stop");
        assert_eq!(payloads[3], "[DONE]");

        // Round robin: the next dispatch is served by b.
        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({
                    "messages": [{"role": "user", "content": "hi"}],
                    "stream": true
                }),
            ))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("from-b"));
    }

    #[tokio::test]
    async fn test_stream_defaults_on() {
        let (state, key) =
            state_with(vec![provider("a")], vec![("a", Script::Chunks(vec!["x"]))]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));
    }

    #[tokio::test]
    async fn test_non_streaming_completion() {
        let (state, key) = state_with(
            vec![provider("a")],
            vec![("a", Script::Chunks(vec!["Hel", "lo"]))],
        )
        .await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({
                    "messages": [{"role": "user", "content": "hi"}],
                    "stream": false
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["choices"][0]["message"]["content"], "Hello");
        // ceil(5/4) = 2
        assert_eq!(body["usage"]["completion_tokens"], 2);
        assert_eq!(body["usage"]["prompt_tokens"], 0);
    }

    #[tokio::test]
    async fn test_cross_provider_fallback_on_empty_stream() {
        let (state, key) = state_with(
            vec![provider("a"), provider("b")],
            vec![("a", Script::Empty), ("b", Script::Chunks(vec!["x"]))],
        )
        .await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({
                    "messages": [{"role": "user", "content": "hi"}],
                    "stream": false
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await["choices"][0]["message"]["content"],
            "x"
        );
    }

    #[tokio::test]
    async fn test_all_failed_is_503_with_last_error() {
        let (state, key) = state_with(
            vec![provider("a"), provider("b")],
            vec![
                ("a", Script::FailSync("a down")),
                ("b", Script::FailSync("b down")),
            ],
        )
        .await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({"messages": [{"role": "user", "content": "hi"}], "stream": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap().contains("b down"));
    }

    #[tokio::test]
    async fn test_no_providers_is_503() {
        let (state, key) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                Some(&key),
                &json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "No AI providers configured"
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let (state, key) = state_with(vec![provider("a")], vec![]).await;
        let app = create_router(state);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {key}"))
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }
}

mod messages {
    use super::*;

    #[tokio::test]
    async fn test_non_streaming_message() {
        let (state, key) = state_with(
            vec![provider("a")],
            vec![("a", Script::Chunks(vec!["A", "B", "C"]))],
        )
        .await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/messages",
                Some(&key),
                &json!({
                    "model": "aicarousel",
                    "messages": [{"role": "user", "content": "hi"}],
                    "max_tokens": 100,
                    "stream": false
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["type"], "message");
        assert_eq!(body["content"], json!([{"type": "text", "text": "ABC"}]));
        assert_eq!(body["stop_reason"], "end_turn");
        assert_eq!(body["usage"]["output_tokens"], 1);
    }

    #[tokio::test]
    async fn test_streaming_event_sequence() {
        let (state, key) = state_with(
            vec![provider("a")],
            vec![("a", Script::Chunks(vec!["Hel", "lo"]))],
        )
        .await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/messages",
                Some(&key),
                &json!({
                    "messages": [{"role": "user", "content": "hi"}],
                    "max_tokens": 100,
                    "stream": true
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;

        let positions: Vec<usize> = [
            "event: message_start",
            "event: content_block_start",
            "event: content_block_delta",
            "event: content_block_stop",
            "event: message_delta",
            "event: message_stop",
        ]
        .iter()
        .map(|needle| body.find(needle).expect(needle))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(body.matches("event: message_stop").count(), 1);
    }

    #[tokio::test]
    async fn test_missing_max_tokens_is_400() {
        let (state, key) =
            state_with(vec![provider("a")], vec![("a", Script::Chunks(vec!["x"]))]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/messages",
                Some(&key),
                &json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("max_tokens"));
    }

    #[tokio::test]
    async fn test_count_tokens() {
        let (state, key) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        // 2 + 11 = 13 chars; ceil(13/4) = 4
        let response = app
            .oneshot(post_json(
                "/v1/messages/count_tokens",
                Some(&key),
                &json!({
                    "system": "Be",
                    "messages": [{"role": "user", "content": "hello world"}],
                    "max_tokens": 100
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["input_tokens"], 4);
    }

    #[tokio::test]
    async fn test_count_tokens_missing_max_tokens_is_400() {
        let (state, key) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/v1/messages/count_tokens",
                Some(&key),
                &json!({"messages": [{"role": "user", "content": "hello world"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("max_tokens"));
    }
}

mod raw_chat {
    use super::*;

    #[tokio::test]
    async fn test_raw_stream_no_framing() {
        let (state, key) = state_with(
            vec![provider("a")],
            vec![("a", Script::Chunks(vec!["Hel", "lo"]))],
        )
        .await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json(
                "/chat",
                Some(&key),
                &json!([{"role": "user", "content": "hi"}]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));
        assert_eq!(body_string(response).await, "Hello");
    }

    #[tokio::test]
    async fn test_raw_chat_requires_auth() {
        let (state, _) = state_with(vec![provider("a")], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(post_json("/chat", None, &json!([])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

mod cors {
    use super::*;

    #[tokio::test]
    async fn test_preflight_answered_without_auth() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/chat/completions")
            .header(header::ORIGIN, "https://example.com")
            .header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                "POST",
            )
            .header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                "content-type, authorization",
            )
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_responses_carry_allow_origin() {
        let (state, _) = state_with(vec![], vec![]).await;
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
