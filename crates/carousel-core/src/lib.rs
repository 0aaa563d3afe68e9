//! # Carousel Core
//!
//! Core types for the aicarousel gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Chat message and role types
//! - The internal chunk-stream abstraction
//! - Dispatch result types
//! - The shared upstream error type

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod streaming;

// Re-export commonly used types
pub use error::UpstreamError;
pub use message::{ChatMessage, ChatRole};
pub use streaming::{ChatResult, TextStream};
