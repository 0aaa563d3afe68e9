//! # aicarousel
//!
//! Multi-upstream AI chat gateway.
//!
//! Clients speak OpenAI- or Anthropic-style wire formats; the gateway
//! authenticates them, picks an upstream provider round-robin, fails over
//! across models and providers, and streams the answer back in the
//! client's dialect.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 7123, ./aicarousel.db, ./models.json)
//! aicarousel
//!
//! # Override via environment
//! PORT=9000 GROQ_API_KEY=... aicarousel
//! ```

use carousel_config::ModelsStore;
use carousel_dispatch::ChatHandler;
use carousel_providers::{default_models_document, ProviderRegistry, SdkFactory, KNOWN_PROVIDERS};
use carousel_server::{AppState, Server, ServerConfig};
use carousel_store::{apply_pending, connect, CredentialStore, ProviderSettingsStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point
#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment.
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if dotenv_loaded {
        info!("Loaded environment from .env");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting aicarousel gateway"
    );

    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Database and migrations
    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "aicarousel.db".to_string());
    let pool = connect(&database_path).await?;
    let applied = apply_pending(&pool).await?;
    if applied > 0 {
        info!(applied, "Applied database migrations");
    }

    // Provider settings: every known provider gets a row
    let settings = ProviderSettingsStore::new(pool.clone());
    let known_keys: Vec<&str> = KNOWN_PROVIDERS.iter().map(|d| d.key).collect();
    settings.sync_known(&known_keys).await?;

    // Models configuration, seeded on first boot
    let models_path =
        std::env::var("MODELS_CONFIG_PATH").unwrap_or_else(|_| "models.json".to_string());
    let models = Arc::new(ModelsStore::new(models_path));
    models.ensure_exists(&default_models_document())?;

    let keyed = KNOWN_PROVIDERS.iter().filter(|d| d.has_api_key()).count();
    if keyed == 0 {
        warn!("No provider API keys set; every dispatch will fail until one is configured");
    } else {
        info!(providers = keyed, "Providers with key material");
    }

    // Dispatch core and HTTP surface
    let registry = ProviderRegistry::new(settings, models);
    let handler = Arc::new(ChatHandler::new(
        Arc::new(registry),
        Arc::new(SdkFactory::new()),
    ));
    let state = AppState::new(handler, CredentialStore::new(pool));

    let server = Server::new(ServerConfig::from_env(), state);
    server.run().await?;

    Ok(())
}
