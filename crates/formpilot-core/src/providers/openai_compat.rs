//! Client for OpenAI-compatible chat completion endpoints.
//!
//! Covers OpenAI itself plus OpenRouter, Groq, and every user-defined custom
//! provider — they all share the `/chat/completions` wire format with a
//! configurable base URL.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::{api_error, http_client};
use super::types::{
    GenerateOptions, GenerateResponse, GenerationConfig, LlmClient, ProviderId, TokenUsage,
};

/// Client for any OpenAI-compatible backend
pub struct OpenAiCompatClient {
    client: Client,
    provider: ProviderId,
    /// Label used in error messages (e.g. "OpenAI", "Groq", a custom name)
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    requires_api_key: bool,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompatClient {
    /// Create a client for one of the built-in OpenAI-compatible providers
    /// or a custom endpoint.
    ///
    /// - `name`: label for logs and error messages
    /// - `requires_api_key`: whether generate() must refuse without a key
    pub fn new(
        provider: ProviderId,
        name: &str,
        config: &GenerationConfig,
        requires_api_key: bool,
    ) -> Self {
        Self {
            client: http_client(config.timeout_ms),
            provider,
            name: name.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            requires_api_key,
        }
    }

    fn key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_health(&self) -> bool {
        // OpenRouter serves /models without a credential; everything else
        // that requires a key is reported down before any network I/O.
        if self.requires_api_key && self.key().is_none() && self.provider != ProviderId::OpenRouter
        {
            return false;
        }
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(key) = self.key() {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse> {
        if self.requires_api_key && self.key().is_none() {
            return Err(anyhow!("{} API key required", self.name));
        }

        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::new();
        if let Some(system) = options.system.as_deref() {
            messages.push(ChatRequestMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        messages.push(ChatRequestMessage {
            role: "user",
            content: prompt.to_string(),
        });

        debug!(
            "{} request: model={}, messages={}",
            self.name,
            self.model,
            messages.len()
        );

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": options.max_tokens.unwrap_or(self.max_tokens),
            "temperature": options.temperature.unwrap_or(self.temperature),
        });
        if let Some(stop) = &options.stop {
            body["stop"] = serde_json::to_value(stop)?;
        }

        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = self.key() {
            request = request.bearer_auth(key);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(api_error(&self.name, status, &error_text));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.name))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} response had no choices", self.name))?;

        Ok(GenerateResponse {
            text: choice.message.content.unwrap_or_default(),
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
            provider: self.provider,
            usage: api_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
            latency_ms,
        })
    }

    async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/models", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(key) = self.key() {
            request = request.bearer_auth(key);
        }
        let Ok(resp) = request.send().await else {
            return Vec::new();
        };
        if !resp.status().is_success() {
            return Vec::new();
        }
        match resp.json::<ModelListResponse>().await {
            Ok(list) => list.data.into_iter().map(|m| m.id).collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ── OpenAI-compatible wire types ──

#[derive(Debug, Serialize)]
struct ChatRequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    data: Vec<ModelListEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelListEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_config;

    fn client_for(provider: ProviderId, api_key: Option<&str>) -> OpenAiCompatClient {
        let mut config = default_config(provider).unwrap();
        config.api_key = api_key.map(str::to_string);
        OpenAiCompatClient::new(provider, "OpenAI", &config, true)
    }

    #[test]
    fn test_chat_completion_parsing() {
        let json = r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_chat_completion_with_usage() {
        let json = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "x"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.total_tokens, 7);
        assert_eq!(parsed.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_model_list_parsing() {
        let json = r#"{"data":[{"id":"gpt-4o"},{"id":"gpt-4o-mini"}]}"#;
        let parsed: ModelListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_refuses_without_required_key() {
        let client = client_for(ProviderId::OpenAi, None);
        let err = client
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key required"));
    }

    #[tokio::test]
    async fn test_health_false_without_required_key() {
        let client = client_for(ProviderId::OpenAi, None);
        assert!(!client.check_health().await);
    }

    #[tokio::test]
    async fn test_generate_maps_mocked_response() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body =
                r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}]}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        let mut config = default_config(ProviderId::OpenAi).unwrap();
        config.base_url = format!("http://{}", addr);
        config.api_key = Some("sk-test".to_string());
        let client = OpenAiCompatClient::new(ProviderId::OpenAi, "OpenAI", &config, true);

        let result = client
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.finish_reason.as_deref(), Some("stop"));
        assert!(result.usage.is_none());
    }
}
