//! Ollama client using the native `/api/generate` endpoint

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use super::{api_error, http_client};
use super::types::{
    GenerateOptions, GenerateResponse, GenerationConfig, LlmClient, ProviderId, TokenUsage,
};

/// Client for a local Ollama server
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: http_client(config.timeout_ms),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse> {
        let url = format!("{}/api/generate", self.base_url);

        // Ollama's generate endpoint takes a single prompt string, so the
        // system prompt is prefixed with a blank-line separator.
        let full_prompt = match options.system.as_deref() {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        let body = serde_json::json!({
            "model": self.model,
            "prompt": full_prompt,
            "stream": false,
            "options": {
                "num_predict": options.max_tokens.unwrap_or(self.max_tokens),
                "temperature": options.temperature.unwrap_or(self.temperature),
                "stop": options.stop.clone().unwrap_or_default(),
            },
        });

        debug!("Ollama request: model={}, prompt_len={}", self.model, full_prompt.len());

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(api_error("Ollama", status, &error_text));
        }

        let api_response: OllamaGenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let prompt_tokens = api_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = api_response.eval_count.unwrap_or(0);
        let finish_reason = if api_response.done { "stop" } else { "length" };

        Ok(GenerateResponse {
            text: api_response.response,
            model: self.model.clone(),
            provider: ProviderId::Ollama,
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            finish_reason: Some(finish_reason.to_string()),
            latency_ms,
        })
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);
        let Ok(resp) = self.client.get(&url).send().await else {
            return Vec::new();
        };
        if !resp.status().is_success() {
            return Vec::new();
        }
        match resp.json::<OllamaTagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ── Ollama wire types ──

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}
