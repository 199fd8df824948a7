//! Multi-backend LLM abstraction layer.
//!
//! Each backend gets one client implementing [`LlmClient`]; clients are
//! built from a [`GenerationConfig`] via [`build_client`] and composed by
//! [`LlmRouter`] for primary/fallback failover.

pub mod anthropic;
pub mod assist;
pub mod gemini;
pub mod ollama;
pub mod openai_compat;
pub mod router;
pub mod types;

use anyhow::anyhow;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::registry::CustomProvider;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;
pub use router::LlmRouter;
pub use types::{
    ConfigUpdate, ConnectionStatus, GenerateOptions, GenerateResponse, GenerationConfig,
    LlmClient, ProviderId, TokenUsage,
};

/// Build a reqwest client whose requests abort at the configured timeout.
///
/// Shared by all backend clients; the timeout applies per request, so
/// concurrent in-flight calls expire independently.
pub(crate) fn http_client(timeout_ms: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .expect("Failed to build HTTP client")
}

/// Turn a non-2xx backend reply into an error, pulling the human-readable
/// message out of the JSON error body when one is present.
pub(crate) fn api_error(provider: &str, status: StatusCode, body: &str) -> anyhow::Error {
    let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| v.get("error").and_then(Value::as_str).map(str::to_string))
            .or_else(|| v.get("message").and_then(Value::as_str).map(str::to_string))
    });
    match detail {
        Some(message) => anyhow!("{provider} API request failed with status {status}: {message}"),
        None => anyhow!("{provider} API request failed with status {status}"),
    }
}

/// Construct the client for a config, exhaustively over [`ProviderId`].
///
/// `Custom` configs resolve their record in `custom_providers`; a dangling
/// reference is an error and the caller must re-select a provider.
pub fn build_client(
    config: &GenerationConfig,
    custom_providers: &[CustomProvider],
) -> anyhow::Result<Box<dyn LlmClient>> {
    config.validate()?;
    let client: Box<dyn LlmClient> = match config.provider {
        ProviderId::Ollama => Box::new(OllamaClient::new(config)),
        ProviderId::Anthropic => Box::new(AnthropicClient::new(config)),
        ProviderId::Gemini => Box::new(GeminiClient::new(config)),
        ProviderId::OpenAi => {
            Box::new(OpenAiCompatClient::new(config.provider, "OpenAI", config, true))
        }
        ProviderId::OpenRouter => {
            Box::new(OpenAiCompatClient::new(config.provider, "OpenRouter", config, true))
        }
        ProviderId::Groq => {
            Box::new(OpenAiCompatClient::new(config.provider, "Groq", config, true))
        }
        ProviderId::Custom => {
            let id = config.custom_provider_id.as_deref().unwrap_or_default();
            let custom = custom_providers
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| anyhow!("custom provider {id} not found, re-select a provider"))?;
            Box::new(OpenAiCompatClient::new(
                ProviderId::Custom,
                &custom.name,
                config,
                custom.requires_api_key,
            ))
        }
    };
    Ok(client)
}
