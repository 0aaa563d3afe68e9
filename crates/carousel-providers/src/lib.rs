//! # Carousel Providers
//!
//! Upstream adapters and provider selection for the aicarousel gateway.
//!
//! This crate provides:
//! - The static table of known providers and their adapter kinds
//! - `UpstreamAdapter` implementations (OpenAI-compatible remote and local
//!   HTTP, Google Gemini)
//! - `AdapterFactory` for constructing an adapter per (provider, model)
//! - `ProviderRegistry`: the ordered list of providers eligible right now

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod descriptor;
pub mod google;
pub mod openai_compat;
pub mod registry;

pub use adapter::{AdapterFactory, SdkFactory, UpstreamAdapter};
pub use descriptor::{default_models_document, descriptor, AdapterKind, ProviderDescriptor, KNOWN_PROVIDERS};
pub use google::GeminiAdapter;
pub use openai_compat::OpenAiCompatAdapter;
pub use registry::{ActiveProvider, ProviderRegistry, RegistryError};
