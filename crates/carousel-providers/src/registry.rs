//! The active-provider registry.
//!
//! Produces, on demand, the ordered list of providers eligible to serve a
//! request right now. Nothing is cached across calls: enable flags,
//! priorities, and model lists may all change without a restart.

use crate::descriptor::KNOWN_PROVIDERS;
use carousel_config::{ConfigError, ModelsStore};
use carousel_store::{ProviderSetting, ProviderSettingsStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A provider eligible to serve a request at this moment.
///
/// Derived fresh per registry query; never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProvider {
    /// Stable provider key
    pub key: String,
    /// Human-readable name
    pub name: String,
    /// Configured models, in fallback priority order
    pub models: Vec<String>,
    /// Model tried first
    pub default_model: String,
    /// Whether the remaining models are tried after the default
    pub enable_fallback: bool,
    /// Dispatch ordering (ascending)
    pub priority: i64,
}

/// Errors surfaced by registry queries.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Settings store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Models configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Computes the eligible provider set for each dispatch.
pub struct ProviderRegistry {
    settings: ProviderSettingsStore,
    models: Arc<ModelsStore>,
}

impl ProviderRegistry {
    /// Create a registry over the two configuration sources.
    #[must_use]
    pub fn new(settings: ProviderSettingsStore, models: Arc<ModelsStore>) -> Self {
        Self { settings, models }
    }

    /// The ordered list of providers eligible right now.
    ///
    /// A provider is active when its API-key variable is set non-empty, it
    /// is enabled, and it has at least one configured model. Results are
    /// sorted ascending by priority; providers without a settings row sort
    /// after all configured rows, in descriptor order. When no settings
    /// rows exist at all, every known provider counts as enabled.
    ///
    /// # Errors
    /// Returns an error if a configuration source fails; a missing models
    /// document simply yields no active providers.
    pub async fn list_active(&self) -> Result<Vec<ActiveProvider>, RegistryError> {
        let settings = self.settings.get_all().await?;
        let by_key: HashMap<&str, &ProviderSetting> = settings
            .iter()
            .map(|s| (s.provider_key.as_str(), s))
            .collect();

        let document = match self.models.read() {
            Ok(document) => document,
            Err(ConfigError::NotFound(path)) => {
                debug!(path = %path.display(), "No models configuration; no active providers");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut candidates: Vec<(bool, i64, i64, ActiveProvider)> = Vec::new();
        for (index, descriptor) in KNOWN_PROVIDERS.iter().enumerate() {
            if !descriptor.has_api_key() {
                continue;
            }

            let setting = by_key.get(descriptor.key);
            let enabled = setting.map_or(true, |s| s.is_enabled);
            if !enabled {
                continue;
            }

            let Some(config) = document.get(descriptor.key) else {
                continue;
            };
            if config.models.is_empty() {
                continue;
            }

            let (unconfigured, priority, tiebreak) = match setting {
                Some(s) => (false, s.priority, s.id),
                None => (true, i64::MAX, index as i64),
            };

            candidates.push((
                unconfigured,
                priority,
                tiebreak,
                ActiveProvider {
                    key: descriptor.key.to_string(),
                    name: descriptor.name.to_string(),
                    models: config.models.clone(),
                    default_model: config.default_model.clone(),
                    enable_fallback: config.enable_fallback,
                    priority,
                },
            ));
        }

        candidates.sort_by_key(|(unconfigured, priority, tiebreak, _)| {
            (*unconfigured, *priority, *tiebreak)
        });

        Ok(candidates
            .into_iter()
            .map(|(_, _, _, provider)| provider)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carousel_config::{ModelsDocument, ProviderModels};
    use carousel_store::{apply_pending, connect_in_memory};
    use tempfile::TempDir;

    async fn registry_with(document: &ModelsDocument) -> (TempDir, ProviderRegistry) {
        let dir = TempDir::new().expect("tempdir");
        let models = Arc::new(ModelsStore::new(dir.path().join("models.json")));
        models.save(document).expect("seed models");

        let pool = connect_in_memory().await.expect("pool");
        apply_pending(&pool).await.expect("migrate");
        let settings = ProviderSettingsStore::new(pool);

        (dir, ProviderRegistry::new(settings, models))
    }

    fn document_for(keys: &[&str]) -> ModelsDocument {
        let mut document = ModelsDocument::new();
        for key in keys {
            document.insert(
                (*key).to_string(),
                ProviderModels::new("m1", vec!["m1".to_string(), "m2".to_string()]),
            );
        }
        document
    }

    // The env-var gate is process-global, so each test touches a disjoint
    // set of provider keys.

    #[tokio::test]
    async fn test_key_and_models_entry_both_required() {
        // Document mentions only groq; cerebras is exercised with and
        // without a key.
        let (_dir, registry) = registry_with(&document_for(&["groq"])).await;

        std::env::remove_var("CEREBRAS_API_KEY");
        let actives = registry.list_active().await.expect("list");
        assert!(actives.iter().all(|p| p.key != "cerebras"));

        // A key alone is not enough without a models entry.
        std::env::set_var("CEREBRAS_API_KEY", "test-key-registry-d");
        let actives = registry.list_active().await.expect("list");
        assert!(actives.iter().all(|p| p.key != "cerebras"));

        std::env::remove_var("CEREBRAS_API_KEY");
    }

    #[tokio::test]
    async fn test_blank_key_counts_as_missing() {
        let (_dir, registry) = registry_with(&document_for(&["openrouter"])).await;
        std::env::set_var("OPENROUTER_API_KEY", "   ");

        let actives = registry.list_active().await.expect("list");
        assert!(actives.iter().all(|p| p.key != "openrouter"));

        std::env::remove_var("OPENROUTER_API_KEY");
    }

    #[tokio::test]
    async fn test_active_without_settings_rows() {
        let (_dir, registry) = registry_with(&document_for(&["groq"])).await;
        std::env::set_var("GROQ_API_KEY", "test-key-registry-a");

        let actives = registry.list_active().await.expect("list");
        let groq = actives.iter().find(|p| p.key == "groq").expect("active");
        assert_eq!(groq.name, "Groq");
        assert_eq!(groq.default_model, "m1");
        assert_eq!(groq.models, vec!["m1", "m2"]);

        std::env::remove_var("GROQ_API_KEY");
    }

    #[tokio::test]
    async fn test_disabled_provider_filtered_and_priority_orders() {
        let (_dir, registry) = registry_with(&document_for(&["gemini", "ollama"])).await;
        std::env::set_var("GEMINI_API_KEY", "test-key-registry-b");
        std::env::set_var("OLLAMA_API_KEY", "test-key-registry-c");

        registry
            .settings
            .sync_known(&["gemini", "ollama"])
            .await
            .expect("sync");

        // ollama ahead of gemini via priority
        registry
            .settings
            .set_priority("ollama", -1)
            .await
            .expect("priority");
        let actives = registry.list_active().await.expect("list");
        let keys: Vec<_> = actives
            .iter()
            .filter(|p| p.key == "gemini" || p.key == "ollama")
            .map(|p| p.key.clone())
            .collect();
        assert_eq!(keys, vec!["ollama", "gemini"]);

        // Disabling removes from the active set without restart.
        registry
            .settings
            .set_enabled("ollama", false)
            .await
            .expect("disable");
        let actives = registry.list_active().await.expect("list");
        assert!(actives.iter().all(|p| p.key != "ollama"));
        assert!(actives.iter().any(|p| p.key == "gemini"));

        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("OLLAMA_API_KEY");
    }

    #[tokio::test]
    async fn test_missing_models_file_yields_empty() {
        let dir = TempDir::new().expect("tempdir");
        let models = Arc::new(ModelsStore::new(dir.path().join("absent.json")));
        let pool = connect_in_memory().await.expect("pool");
        apply_pending(&pool).await.expect("migrate");
        let registry = ProviderRegistry::new(ProviderSettingsStore::new(pool), models);

        let actives = registry.list_active().await.expect("list");
        assert!(actives.is_empty());
    }
}
