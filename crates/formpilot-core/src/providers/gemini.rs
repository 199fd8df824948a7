//! Google Gemini generateContent client

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tracing::debug;

use super::{api_error, http_client};
use super::types::{
    GenerateOptions, GenerateResponse, GenerationConfig, LlmClient, ProviderId, TokenUsage,
};

/// Client for the Gemini generateContent API
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: http_client(config.timeout_ms),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_health(&self) -> bool {
        let Some(key) = self.key() else {
            return false;
        };
        let url = format!("{}/v1beta/models?key={}", self.base_url, key);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse> {
        let api_key = self.key().ok_or_else(|| anyhow!("Gemini API key required"))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        // The contents array carries no distinct system role here, so a
        // system prompt is folded into the single user turn as plain text.
        let text = match options.system.as_deref() {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };

        let mut generation_config = serde_json::json!({
            "maxOutputTokens": options.max_tokens.unwrap_or(self.max_tokens),
            "temperature": options.temperature.unwrap_or(self.temperature),
        });
        if let Some(stop) = &options.stop {
            generation_config["stopSequences"] = serde_json::to_value(stop)?;
        }

        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": text}]}],
            "generationConfig": generation_config,
        });

        debug!("Gemini request: model={}", self.model);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(api_error("Gemini", status, &error_text));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Gemini response had no candidates"))?;
        let text = candidate
            .content
            .parts
            .into_iter()
            .next()
            .and_then(|p| p.text)
            .ok_or_else(|| anyhow!("Gemini response had no text parts"))?;

        Ok(GenerateResponse {
            text,
            model: self.model.clone(),
            provider: ProviderId::Gemini,
            usage: api_response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            }),
            finish_reason: candidate.finish_reason,
            latency_ms,
        })
    }

    async fn list_models(&self) -> Vec<String> {
        let Some(key) = self.key() else {
            return Vec::new();
        };
        let url = format!("{}/v1beta/models?key={}", self.base_url, key);
        let Ok(resp) = self.client.get(&url).send().await else {
            return Vec::new();
        };
        if !resp.status().is_success() {
            return Vec::new();
        }
        match resp.json::<ModelListResponse>().await {
            Ok(list) => list
                .models
                .into_iter()
                .map(|m| m.name.trim_start_matches("models/").to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ── Gemini wire types ──

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    models: Vec<GeminiModelEntry>,
}

#[derive(Debug, Deserialize)]
struct GeminiModelEntry {
    name: String,
}
