//! Static catalog of built-in providers and default configurations

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::providers::{GenerationConfig, ProviderId};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A model a provider can serve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    /// Context window in tokens
    pub context_window: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModelInfo {
    pub fn new(id: &str, name: &str, context_window: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            context_window,
            description: None,
        }
    }
}

/// Static descriptor for a provider in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: ProviderId,
    pub name: String,
    pub description: String,
    pub requires_api_key: bool,
    pub default_base_url: String,
    pub default_model: String,
    pub is_free: bool,
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub is_custom: bool,
}

/// A user-defined OpenAI-compatible provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    #[serde(default)]
    pub requires_api_key: bool,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomProvider {
    pub fn new(
        name: &str,
        description: &str,
        base_url: &str,
        requires_api_key: bool,
        models: Vec<ModelInfo>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            base_url: base_url.to_string(),
            requires_api_key,
            models,
            created_at: now,
            updated_at: now,
        }
    }

    /// Present this record as catalog metadata alongside the built-ins
    pub fn to_provider_info(&self) -> ProviderInfo {
        let models = if self.models.is_empty() {
            vec![ModelInfo::new("default", "Default", 8_192)]
        } else {
            self.models.clone()
        };
        ProviderInfo {
            id: ProviderId::Custom,
            name: self.name.clone(),
            description: self.description.clone(),
            requires_api_key: self.requires_api_key,
            default_base_url: self.base_url.clone(),
            default_model: models[0].id.clone(),
            is_free: false,
            models,
            is_custom: true,
        }
    }

    /// Seed a config pointing at this provider
    pub fn default_config(&self, api_key: Option<String>) -> GenerationConfig {
        let info = self.to_provider_info();
        GenerationConfig {
            provider: ProviderId::Custom,
            custom_provider_id: Some(self.id.clone()),
            api_key,
            base_url: info.default_base_url,
            model: info.default_model,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Catalog entry for a built-in provider; None for [`ProviderId::Custom`]
pub fn provider_info(id: ProviderId) -> Option<ProviderInfo> {
    let info = match id {
        ProviderId::Ollama => ProviderInfo {
            id,
            name: "Ollama".to_string(),
            description: "Local inference server, no API key needed".to_string(),
            requires_api_key: false,
            default_base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.2".to_string(),
            is_free: true,
            models: vec![
                ModelInfo::new("llama3.2", "Llama 3.2", 131_072),
                ModelInfo::new("llama3.1", "Llama 3.1", 131_072),
                ModelInfo::new("mistral", "Mistral 7B", 32_768),
                ModelInfo::new("qwen2.5", "Qwen 2.5", 131_072),
            ],
            is_custom: false,
        },
        ProviderId::Anthropic => ProviderInfo {
            id,
            name: "Anthropic".to_string(),
            description: "Claude models via the Anthropic messages API".to_string(),
            requires_api_key: true,
            default_base_url: "https://api.anthropic.com".to_string(),
            default_model: "claude-3-5-haiku-latest".to_string(),
            is_free: false,
            models: vec![
                ModelInfo::new("claude-3-5-haiku-latest", "Claude 3.5 Haiku", 200_000),
                ModelInfo::new("claude-sonnet-4-20250514", "Claude Sonnet 4", 200_000),
            ],
            is_custom: false,
        },
        ProviderId::OpenAi => ProviderInfo {
            id,
            name: "OpenAI".to_string(),
            description: "GPT models via the chat completions API".to_string(),
            requires_api_key: true,
            default_base_url: "https://api.openai.com/v1".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            is_free: false,
            models: vec![
                ModelInfo::new("gpt-4o-mini", "GPT-4o mini", 128_000),
                ModelInfo::new("gpt-4o", "GPT-4o", 128_000),
            ],
            is_custom: false,
        },
        ProviderId::Gemini => ProviderInfo {
            id,
            name: "Google Gemini".to_string(),
            description: "Gemini models via the generateContent API".to_string(),
            requires_api_key: true,
            default_base_url: "https://generativelanguage.googleapis.com".to_string(),
            default_model: "gemini-2.0-flash".to_string(),
            is_free: false,
            models: vec![
                ModelInfo::new("gemini-2.0-flash", "Gemini 2.0 Flash", 1_048_576),
                ModelInfo::new("gemini-1.5-pro", "Gemini 1.5 Pro", 2_097_152),
            ],
            is_custom: false,
        },
        ProviderId::OpenRouter => ProviderInfo {
            id,
            name: "OpenRouter".to_string(),
            description: "Aggregator over many hosted models, OpenAI-compatible".to_string(),
            requires_api_key: true,
            default_base_url: "https://openrouter.ai/api/v1".to_string(),
            default_model: "meta-llama/llama-3.1-8b-instruct:free".to_string(),
            is_free: true,
            models: vec![
                ModelInfo::new(
                    "meta-llama/llama-3.1-8b-instruct:free",
                    "Llama 3.1 8B (free)",
                    131_072,
                ),
                ModelInfo::new("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", 200_000),
                ModelInfo::new("openai/gpt-4o-mini", "GPT-4o mini", 128_000),
            ],
            is_custom: false,
        },
        ProviderId::Groq => ProviderInfo {
            id,
            name: "Groq".to_string(),
            description: "Fast inference on open models, OpenAI-compatible".to_string(),
            requires_api_key: true,
            default_base_url: "https://api.groq.com/openai/v1".to_string(),
            default_model: "llama-3.3-70b-versatile".to_string(),
            is_free: true,
            models: vec![
                ModelInfo::new("llama-3.3-70b-versatile", "Llama 3.3 70B", 131_072),
                ModelInfo::new("llama-3.1-8b-instant", "Llama 3.1 8B", 131_072),
            ],
            is_custom: false,
        },
        ProviderId::Custom => return None,
    };
    Some(info)
}

/// All built-in providers in catalog order
pub fn all_providers() -> Vec<ProviderInfo> {
    ProviderId::BUILTIN
        .into_iter()
        .filter_map(provider_info)
        .collect()
}

/// Seed a config from a built-in provider's catalog defaults
pub fn default_config(id: ProviderId) -> Result<GenerationConfig> {
    let info = provider_info(id)
        .ok_or_else(|| anyhow!("custom providers derive their config from the stored record"))?;
    Ok(GenerationConfig {
        provider: id,
        custom_provider_id: None,
        api_key: None,
        base_url: info.default_base_url,
        model: info.default_model,
        max_tokens: DEFAULT_MAX_TOKENS,
        temperature: DEFAULT_TEMPERATURE,
        timeout_ms: DEFAULT_TIMEOUT_MS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_six_entries() {
        assert_eq!(all_providers().len(), 6);
    }

    #[test]
    fn test_every_builtin_has_models() {
        for info in all_providers() {
            assert!(!info.models.is_empty(), "{} has no models", info.name);
            assert!(!info.is_custom);
        }
    }

    #[test]
    fn test_default_config_matches_catalog() {
        for id in ProviderId::BUILTIN {
            let info = provider_info(id).unwrap();
            let config = default_config(id).unwrap();
            assert_eq!(config.provider, id);
            assert_eq!(config.base_url, info.default_base_url);
            assert_eq!(config.model, info.default_model);
            assert!(config.max_tokens > 0);
            assert!(config.timeout_ms > 0);
            assert!((0.0..=2.0).contains(&config.temperature));
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_default_config_rejects_custom() {
        assert!(default_config(ProviderId::Custom).is_err());
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let info = provider_info(ProviderId::Ollama).unwrap();
        assert!(!info.requires_api_key);
        assert!(info.is_free);
    }

    #[test]
    fn test_custom_provider_to_info() {
        let custom = CustomProvider::new(
            "My LM Studio",
            "Local OpenAI-compatible server",
            "http://localhost:1234/v1",
            false,
            vec![ModelInfo::new("qwen2.5-7b", "Qwen 2.5 7B", 32_768)],
        );
        let info = custom.to_provider_info();
        assert!(info.is_custom);
        assert_eq!(info.id, ProviderId::Custom);
        assert_eq!(info.default_model, "qwen2.5-7b");
        assert!(!info.models.is_empty());
    }

    #[test]
    fn test_custom_provider_empty_models_get_placeholder() {
        let custom = CustomProvider::new("bare", "", "http://localhost:9999/v1", false, vec![]);
        let info = custom.to_provider_info();
        assert_eq!(info.models.len(), 1);
        assert_eq!(info.default_model, "default");
    }

    #[test]
    fn test_custom_provider_default_config() {
        let custom = CustomProvider::new("remote", "", "https://llm.example.com/v1", true, vec![]);
        let config = custom.default_config(Some("key".to_string()));
        assert_eq!(config.provider, ProviderId::Custom);
        assert_eq!(config.custom_provider_id.as_deref(), Some(custom.id.as_str()));
        assert_eq!(config.base_url, "https://llm.example.com/v1");
        assert!(config.validate().is_ok());
    }
}
