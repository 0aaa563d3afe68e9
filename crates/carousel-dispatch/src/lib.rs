//! # Carousel Dispatch
//!
//! The dispatch core of the aicarousel gateway.
//!
//! `ChatHandler` turns a list of chat messages into a validated
//! [`carousel_core::ChatResult`], honoring:
//! - round-robin fairness across active providers
//! - per-provider model fallback (default first, then list order)
//! - cross-provider failover with first-chunk validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handler;

pub use error::DispatchError;
pub use handler::{ChatHandler, ProviderSource};
