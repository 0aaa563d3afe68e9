//! # Carousel Server
//!
//! HTTP surface of the aicarousel gateway.
//!
//! This crate provides:
//! - Axum router for the OpenAI- and Anthropic-style endpoints
//! - API-key authentication middleware over the credential store
//! - Streaming and non-streaming wire-format translators
//! - CORS and dialect-matched error bodies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod translate;

pub use error::{ApiError, Dialect};
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use state::AppState;

/// Service name advertised by `/health` and the model catalogue.
pub const SERVICE_NAME: &str = "aicarousel";
