//! Persisted settings: active configuration, fallback, custom providers.
//!
//! Everything lives in one JSON document so the extension-facing layers can
//! treat it as plain serializable records.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use url::Url;

use crate::providers::{GenerationConfig, ProviderId};
use crate::registry::{self, CustomProvider};

/// The whole persisted state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub active: GenerationConfig,
    #[serde(default)]
    pub fallback: Option<GenerationConfig>,
    #[serde(default)]
    pub fallback_enabled: bool,
    #[serde(default)]
    pub custom_providers: Vec<CustomProvider>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active: registry::default_config(ProviderId::Ollama)
                .expect("ollama catalog entry exists"),
            fallback: None,
            fallback_enabled: false,
            custom_providers: Vec::new(),
        }
    }
}

impl Settings {
    /// The active config, guarded against a dangling custom-provider
    /// reference: if the referenced record is gone, fall back to the Ollama
    /// default rather than handing out an unusable config.
    pub fn active_config(&self) -> GenerationConfig {
        if self.active.provider == ProviderId::Custom {
            let resolvable = self
                .active
                .custom_provider_id
                .as_deref()
                .is_some_and(|id| self.custom_providers.iter().any(|c| c.id == id));
            if !resolvable {
                warn!("Active config references a missing custom provider, using Ollama default");
                return registry::default_config(ProviderId::Ollama)
                    .expect("ollama catalog entry exists");
            }
        }
        self.active.clone()
    }
}

/// File-backed settings store
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the platform config location
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow!("no config directory available"))?;
        Ok(Self {
            path: dir.join("formpilot").join("settings.json"),
        })
    }

    /// Store at an explicit path
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load settings, defaulting when the file does not exist yet
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Replace the active config
    pub fn update_active(&self, config: GenerationConfig) -> Result<()> {
        config.validate()?;
        let mut settings = self.load()?;
        settings.active = config;
        self.save(&settings)
    }

    /// Replace the fallback config (None clears it)
    pub fn update_fallback(&self, config: Option<GenerationConfig>, enabled: bool) -> Result<()> {
        if let Some(c) = &config {
            c.validate()?;
        }
        let mut settings = self.load()?;
        settings.fallback = config;
        settings.fallback_enabled = enabled;
        self.save(&settings)
    }

    /// Add a custom provider after validating its endpoint
    pub fn add_custom_provider(&self, provider: CustomProvider) -> Result<()> {
        Url::parse(&provider.base_url)
            .with_context(|| format!("invalid base URL: {}", provider.base_url))?;
        let mut settings = self.load()?;
        info!("Adding custom provider '{}' ({})", provider.name, provider.id);
        settings.custom_providers.push(provider);
        self.save(&settings)
    }

    /// Update a custom provider in place, bumping its updated_at
    pub fn update_custom_provider(&self, mut updated: CustomProvider) -> Result<()> {
        Url::parse(&updated.base_url)
            .with_context(|| format!("invalid base URL: {}", updated.base_url))?;
        let mut settings = self.load()?;
        let slot = settings
            .custom_providers
            .iter_mut()
            .find(|c| c.id == updated.id)
            .ok_or_else(|| anyhow!("custom provider {} not found", updated.id))?;
        updated.created_at = slot.created_at;
        updated.updated_at = Utc::now();
        *slot = updated;
        self.save(&settings)
    }

    /// Delete a custom provider by id. When the active config referenced it,
    /// the active config is reset to the Ollama default.
    pub fn delete_custom_provider(&self, id: &str) -> Result<()> {
        let mut settings = self.load()?;
        let before = settings.custom_providers.len();
        settings.custom_providers.retain(|c| c.id != id);
        if settings.custom_providers.len() == before {
            return Err(anyhow!("custom provider {id} not found"));
        }

        if settings.active.provider == ProviderId::Custom
            && settings.active.custom_provider_id.as_deref() == Some(id)
        {
            info!("Deleted the active custom provider, resetting to Ollama default");
            settings.active = registry::default_config(ProviderId::Ollama)?;
        }
        if let Some(fallback) = &settings.fallback {
            if fallback.provider == ProviderId::Custom
                && fallback.custom_provider_id.as_deref() == Some(id)
            {
                settings.fallback = None;
                settings.fallback_enabled = false;
            }
        }
        self.save(&settings)
    }
}
