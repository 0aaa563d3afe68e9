//! # Carousel Store
//!
//! Embedded SQLite persistence for the aicarousel gateway.
//!
//! This crate provides:
//! - Pool construction over a single database file
//! - A linear, numbered migration system recorded in `_migrations`
//! - `CredentialStore`: caller API keys (hash-only at rest)
//! - `ProviderSettingsStore`: per-provider enable flag and priority

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod error;
pub mod migrations;
pub mod provider_settings;

pub use credentials::{ApiKeyRecord, CredentialStore};
pub use error::StoreError;
pub use migrations::apply_pending;
pub use provider_settings::{ProviderSetting, ProviderSettingsStore};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Open (creating if missing) the database file at `path`.
///
/// # Errors
/// Returns an error if the pool cannot be established.
pub async fn connect(path: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open an in-memory database.
///
/// Capped at a single connection so every handle observes the same data.
///
/// # Errors
/// Returns an error if the pool cannot be established.
pub async fn connect_in_memory() -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    Ok(pool)
}
