//! Provider-agnostic types for multi-backend text generation

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifies a text-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Local inference server (no credential, free)
    Ollama,
    /// Anthropic messages API
    Anthropic,
    /// OpenAI chat completions API
    OpenAi,
    /// Google Gemini generateContent API
    Gemini,
    /// OpenRouter aggregator (OpenAI-compatible)
    OpenRouter,
    /// Groq fast inference (OpenAI-compatible)
    Groq,
    /// User-defined OpenAI-compatible endpoint
    Custom,
}

impl ProviderId {
    /// All built-in providers, in catalog order
    pub const BUILTIN: [ProviderId; 6] = [
        ProviderId::Ollama,
        ProviderId::Anthropic,
        ProviderId::OpenAi,
        ProviderId::Gemini,
        ProviderId::OpenRouter,
        ProviderId::Groq,
    ];
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
            Self::Groq => "groq",
            Self::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "openrouter" => Ok(Self::OpenRouter),
            "groq" => Ok(Self::Groq),
            "custom" => Ok(Self::Custom),
            other => Err(anyhow!("unknown provider: {other}")),
        }
    }
}

/// The active configuration a client is built from.
///
/// Callers are responsible for clamping values before construction;
/// [`GenerationConfig::validate`] rejects out-of-range values rather than
/// silently fixing them.
#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub provider: ProviderId,
    /// Required iff `provider == Custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_provider_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("provider", &self.provider)
            .field("custom_provider_id", &self.custom_provider_id)
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl GenerationConfig {
    /// Check value ranges and custom-provider linkage
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be greater than 0"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than 0"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if self.provider == ProviderId::Custom && self.custom_provider_id.is_none() {
            return Err(anyhow!("custom provider config is missing custom_provider_id"));
        }
        Ok(())
    }
}

/// Partial update merged into a [`GenerationConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_ms: Option<u64>,
}

impl ConfigUpdate {
    /// Apply the set fields onto `config`, leaving the rest untouched
    pub fn apply(&self, config: &mut GenerationConfig) {
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

/// Per-call overrides; anything unset falls back to the client's config
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop: Option<Vec<String>>,
    pub system: Option<String>,
}

/// Token accounting reported by the backend, when available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a single generation call
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    pub provider: ProviderId,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub latency_ms: u64,
}

/// Result of a health probe
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub provider: ProviderId,
    pub connected: bool,
    pub model: String,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Trait every backend client implements.
///
/// `generate` performs exactly one HTTP request and never retries; failover
/// belongs to the router. `check_health` and `list_models` are advisory probes
/// and swallow all failures.
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Which backend this client talks to
    fn provider(&self) -> ProviderId;

    /// Model identifier requests are issued against
    fn model(&self) -> &str;

    /// Cheapest possible liveness probe, bounded by the configured timeout.
    /// Returns false without network I/O when a required credential is absent.
    async fn check_health(&self) -> bool;

    /// Single text-generation call against the backend's wire format
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse>;

    /// Backend-advertised model ids; empty on any failure
    async fn list_models(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Mask a secret for logs and Debug output
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}
