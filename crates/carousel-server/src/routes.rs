//! Route definitions for the gateway API.

use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{auth, handlers, state::AppState};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Raw chunk-stream endpoint
        .route("/chat", post(handlers::raw_chat))
        // OpenAI- and Anthropic-compatible endpoints
        .nest("/v1", v1_routes())
        // Unknown routes get a dialect-matched 404
        .fallback(handlers::fallback)
        // Apply middleware; CORS is outermost so it also answers preflight
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(cors_layer())
        // Add state
        .with_state(state)
}

/// `/v1` API routes
fn v1_routes() -> Router<AppState> {
    Router::new()
        // Chat completions
        .route("/chat/completions", post(handlers::chat_completions))
        // Models
        .route("/models", get(handlers::list_models))
        .route("/models/:model_id", get(handlers::get_model))
        // Anthropic messages
        .route("/messages", post(handlers::messages))
        .route("/messages/count_tokens", post(handlers::count_tokens))
}

/// Permissive CORS: every response carries `Access-Control-Allow-Origin: *`.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("anthropic-version"),
            HeaderName::from_static("anthropic-beta"),
        ])
}
