//! The static table of providers the gateway knows how to talk to.

use carousel_config::{ModelsDocument, ProviderModels};

/// Which adapter implementation a provider uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Hosted OpenAI-style `/chat/completions` API
    OpenAiCompat,
    /// Google Gemini `generateContent` API
    Google,
    /// OpenAI-style API served by a local process
    LocalHttp,
}

/// Build-time description of a provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderDescriptor {
    /// Stable, unique key
    pub key: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Environment variable holding the API key
    pub api_key_env: &'static str,
    /// Adapter implementation
    pub kind: AdapterKind,
    /// Default API base URL
    pub base_url: &'static str,
    /// Environment variable overriding the base URL, if supported
    pub base_url_env: Option<&'static str>,
    /// Models written to a fresh configuration document; the first is the
    /// default
    pub seed_models: &'static [&'static str],
}

/// Every provider the gateway can dispatch to.
pub const KNOWN_PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        key: "cerebras",
        name: "Cerebras",
        api_key_env: "CEREBRAS_API_KEY",
        kind: AdapterKind::OpenAiCompat,
        base_url: "https://api.cerebras.ai/v1",
        base_url_env: None,
        seed_models: &["llama-3.3-70b", "llama3.1-8b"],
    },
    ProviderDescriptor {
        key: "groq",
        name: "Groq",
        api_key_env: "GROQ_API_KEY",
        kind: AdapterKind::OpenAiCompat,
        base_url: "https://api.groq.com/openai/v1",
        base_url_env: None,
        seed_models: &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"],
    },
    ProviderDescriptor {
        key: "openrouter",
        name: "OpenRouter",
        api_key_env: "OPENROUTER_API_KEY",
        kind: AdapterKind::OpenAiCompat,
        base_url: "https://openrouter.ai/api/v1",
        base_url_env: None,
        seed_models: &[
            "meta-llama/llama-3.3-70b-instruct:free",
            "google/gemini-2.0-flash-exp:free",
        ],
    },
    ProviderDescriptor {
        key: "gemini",
        name: "Gemini",
        api_key_env: "GEMINI_API_KEY",
        kind: AdapterKind::Google,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        base_url_env: None,
        seed_models: &["gemini-2.0-flash", "gemini-1.5-flash"],
    },
    ProviderDescriptor {
        key: "ollama",
        name: "Ollama",
        api_key_env: "OLLAMA_API_KEY",
        kind: AdapterKind::LocalHttp,
        base_url: "http://localhost:11434/v1",
        base_url_env: Some("OLLAMA_BASE_URL"),
        seed_models: &["llama3.2"],
    },
];

/// Look up a descriptor by key.
#[must_use]
pub fn descriptor(key: &str) -> Option<&'static ProviderDescriptor> {
    KNOWN_PROVIDERS.iter().find(|d| d.key == key)
}

impl ProviderDescriptor {
    /// Base URL honoring the override variable when set non-empty.
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        if let Some(var) = self.base_url_env {
            if let Ok(value) = std::env::var(var) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return trimmed.trim_end_matches('/').to_string();
                }
            }
        }
        self.base_url.to_string()
    }

    /// Whether the provider's API key variable is set non-empty.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        std::env::var(self.api_key_env)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }
}

/// The configuration document written when `models.json` does not exist yet.
#[must_use]
pub fn default_models_document() -> ModelsDocument {
    let mut document = ModelsDocument::new();
    for provider in KNOWN_PROVIDERS {
        document.insert(
            provider.key.to_string(),
            ProviderModels::new(
                provider.seed_models[0],
                provider.seed_models.iter().map(|m| (*m).to_string()).collect(),
            ),
        );
    }
    document
}
