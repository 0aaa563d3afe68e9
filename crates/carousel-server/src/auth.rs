//! API-key authentication middleware.

use crate::error::{ApiError, Dialect};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

/// Paths served without authentication.
fn is_public_path(path: &str) -> bool {
    path == "/health" || path == "/v1/models" || path.starts_with("/v1/models/")
}

/// Pull the presented key from `Authorization: Bearer` (preferred) or
/// `x-api-key`.
fn extract_key(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth) = auth.to_str() {
            if let Some(key) = auth.strip_prefix("Bearer ") {
                let key = key.trim();
                if !key.is_empty() {
                    return Some(key.to_string());
                }
            }
        }
    }

    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
}

/// Guard protected paths with the credential store.
///
/// The matching [`carousel_store::ApiKeyRecord`] is attached to the request
/// extensions on success. Error bodies follow the dialect of the path.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_public_path(&path) {
        return next.run(request).await;
    }

    let dialect = Dialect::for_path(&path);
    let Some(presented) = extract_key(request.headers()) else {
        warn!(path = %path, "Request without API key");
        return ApiError::missing_api_key(dialect).into_response();
    };

    match state.credentials.validate(&presented).await {
        Ok(Some(record)) => {
            debug!(key_id = record.id, path = %path, "Request authenticated");
            request.extensions_mut().insert(record);
            next.run(request).await
        }
        Ok(None) => {
            warn!(path = %path, "Invalid API key");
            ApiError::invalid_api_key(dialect).into_response()
        }
        Err(err) => {
            error!(error = %err, "Credential store failure during validation");
            ApiError::internal(dialect).into_response()
        }
    }
}
