//! The `models.json` document and its store.
//!
//! The document is a mapping from provider key to that provider's model
//! configuration. It drives intra-provider fallback order: the default model
//! is tried first, then the remaining models in list order.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-provider model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModels {
    /// Model tried first on every dispatch
    #[serde(rename = "default")]
    pub default_model: String,
    /// Whether the remaining models are tried after the default fails
    pub enable_fallback: bool,
    /// All configured models, in fallback priority order
    pub models: Vec<String>,
}

impl ProviderModels {
    /// Create a configuration from a default model and the full model list.
    #[must_use]
    pub fn new(default_model: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            default_model: default_model.into(),
            enable_fallback: true,
            models,
        }
    }

    /// Models in dispatch order: the default first, then the rest in list
    /// order with the default removed.
    #[must_use]
    pub fn fallback_order(&self) -> Vec<String> {
        let mut order = vec![self.default_model.clone()];
        order.extend(
            self.models
                .iter()
                .filter(|m| **m != self.default_model)
                .cloned(),
        );
        order
    }
}

/// The full on-disk document: provider key → configuration.
pub type ModelsDocument = BTreeMap<String, ProviderModels>;

/// Validate a complete document against the configuration constraints.
///
/// # Errors
/// Returns [`ConfigError::Validation`] naming the first violated constraint.
pub fn validate_document(document: &ModelsDocument) -> Result<(), ConfigError> {
    if document.is_empty() {
        return Err(ConfigError::validation(
            "document must contain at least one provider",
        ));
    }

    for (provider, config) in document {
        if provider.trim().is_empty() {
            return Err(ConfigError::validation("provider keys must be non-empty"));
        }
        if config.default_model.trim().is_empty() {
            return Err(ConfigError::validation(format!(
                "{provider}: default model must be a non-empty string"
            )));
        }
        if config.models.is_empty() {
            return Err(ConfigError::validation(format!(
                "{provider}: models list must not be empty"
            )));
        }
        if config.models.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::validation(format!(
                "{provider}: model names must be non-empty strings"
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for model in &config.models {
            if !seen.insert(model) {
                return Err(ConfigError::validation(format!(
                    "{provider}: duplicate model {model}"
                )));
            }
        }
        if !config.models.contains(&config.default_model) {
            return Err(ConfigError::validation(format!(
                "{provider}: default model {} is not in the models list",
                config.default_model
            )));
        }
    }

    Ok(())
}

struct CachedSnapshot {
    fetched_at: Instant,
    document: ModelsDocument,
}

/// Durable, validated store for the models document.
///
/// Readers take value snapshots served from a short-lived cache; every
/// successful write replaces the file atomically and invalidates the cache.
pub struct ModelsStore {
    path: PathBuf,
    cache: Mutex<Option<CachedSnapshot>>,
    cache_ttl: Duration,
}

impl ModelsStore {
    /// Snapshot cache lifetime. Edits from the configuration tool propagate
    /// within this window.
    pub const CACHE_TTL: Duration = Duration::from_secs(1);

    /// Create a store over the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
            cache_ttl: Self::CACHE_TTL,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `defaults` if no document exists yet.
    ///
    /// # Errors
    /// Returns an error if the defaults are invalid or the write fails.
    pub fn ensure_exists(&self, defaults: &ModelsDocument) -> Result<(), ConfigError> {
        if self.path.exists() {
            return Ok(());
        }
        info!(path = %self.path.display(), "Seeding default models configuration");
        self.save(defaults)
    }

    /// Read a snapshot of the document.
    ///
    /// Served from the cache when fresh; otherwise loaded from disk.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable, or invalid.
    pub fn read(&self) -> Result<ModelsDocument, ConfigError> {
        let mut cache = self.cache.lock().expect("models cache lock poisoned");
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() <= self.cache_ttl {
                return Ok(cached.document.clone());
            }
        }

        let document = self.load()?;
        *cache = Some(CachedSnapshot {
            fetched_at: Instant::now(),
            document: document.clone(),
        });
        Ok(document)
    }

    /// Validate and persist a document, replacing the file atomically.
    ///
    /// # Errors
    /// Returns an error if validation or the write fails.
    pub fn save(&self, document: &ModelsDocument) -> Result<(), ConfigError> {
        validate_document(document)?;

        let rendered = serde_json::to_string_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, rendered)?;
        fs::rename(&tmp_path, &self.path)?;

        // Invalidate; the next read observes the new document.
        *self.cache.lock().expect("models cache lock poisoned") = None;
        debug!(path = %self.path.display(), "Models configuration saved");
        Ok(())
    }

    /// Append a model to a provider's list.
    ///
    /// # Errors
    /// Fails if the provider is unknown or the model already configured.
    pub fn add_model(&self, provider: &str, model: &str) -> Result<(), ConfigError> {
        let mut document = self.load()?;
        let config = entry_mut(&mut document, provider)?;
        if config.models.iter().any(|m| m == model) {
            return Err(ConfigError::DuplicateModel {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        config.models.push(model.to_string());
        self.save(&document)
    }

    /// Remove a model from a provider's list.
    ///
    /// # Errors
    /// Fails if the model is the default, the sole model, or not configured.
    pub fn remove_model(&self, provider: &str, model: &str) -> Result<(), ConfigError> {
        let mut document = self.load()?;
        let config = entry_mut(&mut document, provider)?;
        if !config.models.iter().any(|m| m == model) {
            return Err(ConfigError::ModelNotFound {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        if config.models.len() == 1 {
            return Err(ConfigError::SoleModelRemoval {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        if config.default_model == model {
            return Err(ConfigError::DefaultRemoval {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        config.models.retain(|m| m != model);
        self.save(&document)
    }

    /// Set the provider's default model.
    ///
    /// # Errors
    /// Fails if the model is not in the provider's list.
    pub fn set_default(&self, provider: &str, model: &str) -> Result<(), ConfigError> {
        let mut document = self.load()?;
        let config = entry_mut(&mut document, provider)?;
        if !config.models.iter().any(|m| m == model) {
            return Err(ConfigError::ModelNotFound {
                provider: provider.to_string(),
                model: model.to_string(),
            });
        }
        config.default_model = model.to_string();
        self.save(&document)
    }

    /// Toggle (or set) the provider's fallback flag; returns the new value.
    ///
    /// # Errors
    /// Fails if the provider is unknown or the write fails.
    pub fn toggle_fallback(
        &self,
        provider: &str,
        desired: Option<bool>,
    ) -> Result<bool, ConfigError> {
        let mut document = self.load()?;
        let config = entry_mut(&mut document, provider)?;
        let new_value = desired.unwrap_or(!config.enable_fallback);
        config.enable_fallback = new_value;
        self.save(&document)?;
        Ok(new_value)
    }

    /// Replace the provider's model list with a permutation of itself.
    ///
    /// The new order defines fallback priority.
    ///
    /// # Errors
    /// Fails unless `new_order` is an exact permutation of the current list.
    pub fn reorder_models(
        &self,
        provider: &str,
        new_order: Vec<String>,
    ) -> Result<(), ConfigError> {
        let mut document = self.load()?;
        let config = entry_mut(&mut document, provider)?;

        let mut current = config.models.clone();
        let mut proposed = new_order.clone();
        current.sort();
        proposed.sort();
        if current != proposed {
            return Err(ConfigError::InvalidReorder {
                provider: provider.to_string(),
            });
        }

        config.models = new_order;
        self.save(&document)
    }

    /// Rename a model in place, preserving its position.
    ///
    /// Updates the default model when it equalled `old`.
    ///
    /// # Errors
    /// Fails if `old` is absent or `new` is already configured.
    pub fn update_model(&self, provider: &str, old: &str, new: &str) -> Result<(), ConfigError> {
        let mut document = self.load()?;
        let config = entry_mut(&mut document, provider)?;

        let Some(position) = config.models.iter().position(|m| m == old) else {
            return Err(ConfigError::ModelNotFound {
                provider: provider.to_string(),
                model: old.to_string(),
            });
        };
        if old != new && config.models.iter().any(|m| m == new) {
            return Err(ConfigError::DuplicateModel {
                provider: provider.to_string(),
                model: new.to_string(),
            });
        }

        config.models[position] = new.to_string();
        if config.default_model == old {
            config.default_model = new.to_string();
        }
        self.save(&document)
    }

    /// Load directly from disk, bypassing the cache.
    ///
    /// Mutations start from this to avoid acting on a stale snapshot.
    fn load(&self) -> Result<ModelsDocument, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound(self.path.clone()));
        }
        let raw = fs::read_to_string(&self.path)?;
        let document: ModelsDocument = serde_json::from_str(&raw)?;
        validate_document(&document)?;
        Ok(document)
    }
}

fn entry_mut<'a>(
    document: &'a mut ModelsDocument,
    provider: &str,
) -> Result<&'a mut ProviderModels, ConfigError> {
    document
        .get_mut(provider)
        .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))
}
