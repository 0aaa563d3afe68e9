//! API error type with dialect-matched wire rendering.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use carousel_dispatch::DispatchError;
use serde_json::json;

/// Which wire format the client speaks, decided by the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// OpenAI-style `{"error": {...}}` bodies
    OpenAi,
    /// Anthropic-style `{"type": "error", ...}` bodies
    Anthropic,
}

impl Dialect {
    /// Dialect for a request path: Anthropic for `/v1/messages*`, OpenAI
    /// otherwise.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        if path.starts_with("/v1/messages") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }
}

/// An error ready to be rendered to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_type: &'static str,
    code: Option<&'static str>,
    message: String,
    dialect: Dialect,
}

impl ApiError {
    /// 400 for malformed or incomplete request bodies.
    pub fn invalid_request(dialect: Dialect, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_type: "invalid_request_error",
            code: None,
            message: message.into(),
            dialect,
        }
    }

    /// 401 when no key was presented.
    #[must_use]
    pub fn missing_api_key(dialect: Dialect) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error_type: match dialect {
                Dialect::OpenAi => "invalid_request_error",
                Dialect::Anthropic => "authentication_error",
            },
            code: Some("invalid_api_key"),
            message: "Missing API key".to_string(),
            dialect,
        }
    }

    /// 401 when the presented key failed validation.
    #[must_use]
    pub fn invalid_api_key(dialect: Dialect) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error_type: match dialect {
                Dialect::OpenAi => "invalid_request_error",
                Dialect::Anthropic => "authentication_error",
            },
            code: Some("invalid_api_key"),
            message: "Invalid API key".to_string(),
            dialect,
        }
    }

    /// 404 for unknown routes.
    #[must_use]
    pub fn not_found(dialect: Dialect) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error_type: match dialect {
                Dialect::OpenAi => "invalid_request_error",
                Dialect::Anthropic => "not_found_error",
            },
            code: Some("not_found"),
            message: "Not found".to_string(),
            dialect,
        }
    }

    /// 503 when the active provider set is empty.
    #[must_use]
    pub fn no_providers(dialect: Dialect) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error_type: "api_error",
            code: None,
            message: "No AI providers configured".to_string(),
            dialect,
        }
    }

    /// 503 carrying the last upstream failure message.
    pub fn all_failed(dialect: Dialect, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error_type: "api_error",
            code: None,
            message: message.into(),
            dialect,
        }
    }

    /// 500 for anything unexpected above the dispatch core.
    #[must_use]
    pub fn internal(dialect: Dialect) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_type: "api_error",
            code: None,
            message: "Internal server error".to_string(),
            dialect,
        }
    }

    /// Map a dispatch failure onto its client response.
    #[must_use]
    pub fn from_dispatch(dialect: Dialect, error: &DispatchError) -> Self {
        match error {
            DispatchError::NoProviders => Self::no_providers(dialect),
            DispatchError::AllFailed { .. } => Self::all_failed(dialect, error.last_message()),
            DispatchError::Registry(_) => Self::internal(dialect),
        }
    }

    /// HTTP status of this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The rendered JSON body.
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        match self.dialect {
            Dialect::OpenAi => json!({
                "error": {
                    "message": self.message,
                    "type": self.error_type,
                    "param": null,
                    "code": self.code,
                }
            }),
            Dialect::Anthropic => json!({
                "type": "error",
                "error": {
                    "type": self.error_type,
                    "message": self.message,
                }
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body().to_string(),
        )
            .into_response()
    }
}
