//! # Carousel Config
//!
//! Durable per-provider model configuration for the aicarousel gateway.
//!
//! This crate provides:
//! - The `models.json` document model and its validation rules
//! - `ModelsStore`: read/mutate operations with atomic file replacement
//! - A short-lived snapshot cache invalidated on every write

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;

pub use error::ConfigError;
pub use models::{ModelsDocument, ModelsStore, ProviderModels};
