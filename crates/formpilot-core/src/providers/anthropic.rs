//! Anthropic messages API client

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

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic messages API
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicClient {
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
impl LlmClient for AnthropicClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_health(&self) -> bool {
        // The messages API has no cheap liveness endpoint; a configured
        // credential is the best available health signal.
        self.key().is_some()
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<GenerateResponse> {
        let api_key = self
            .key()
            .ok_or_else(|| anyhow!("Anthropic API key required"))?;

        let url = format!("{}/v1/messages", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(self.max_tokens),
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature.unwrap_or(self.temperature),
        });
        if let Some(system) = options.system.as_deref() {
            body["system"] = serde_json::json!(system);
        }
        if let Some(stop) = &options.stop {
            body["stop_sequences"] = serde_json::to_value(stop)?;
        }

        debug!("Anthropic request: model={}", self.model);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Anthropic")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(api_error("Anthropic", status, &error_text));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = api_response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("Anthropic response had no content blocks"))?;

        Ok(GenerateResponse {
            text,
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
            provider: ProviderId::Anthropic,
            usage: Some(TokenUsage {
                prompt_tokens: api_response.usage.input_tokens,
                completion_tokens: api_response.usage.output_tokens,
                total_tokens: api_response.usage.input_tokens + api_response.usage.output_tokens,
            }),
            finish_reason: api_response.stop_reason,
            latency_ms,
        })
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<MessagesContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: MessagesUsage,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_config;

    fn client_with_key(api_key: Option<&str>) -> AnthropicClient {
        let mut config = default_config(ProviderId::Anthropic).unwrap();
        config.api_key = api_key.map(str::to_string);
        AnthropicClient::new(&config)
    }

    #[test]
    fn test_messages_response_parsing() {
        let json = r#"{
            "content": [{"type": "text", "text": "Hello!"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.content[0].text, "Hello!");
        assert_eq!(parsed.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(parsed.usage.input_tokens, 10);
    }

    #[tokio::test]
    async fn test_health_is_key_presence() {
        assert!(client_with_key(Some("sk-ant-test")).check_health().await);
        assert!(!client_with_key(None).check_health().await);
        assert!(!client_with_key(Some("")).check_health().await);
    }

    #[tokio::test]
    async fn test_generate_refuses_without_key() {
        let err = client_with_key(None)
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key required"));
    }

    #[test]
    fn test_debug_hides_key() {
        let client = client_with_key(Some("sk-ant-secret"));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-ant-secret"));
    }

    #[tokio::test]
    async fn test_generate_maps_mocked_response() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = request_tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let body = r#"{"content":[{"type":"text","text":"Hello!"}],"stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":5}}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        let mut config = default_config(ProviderId::Anthropic).unwrap();
        config.base_url = format!("http://{}", addr);
        config.api_key = Some("sk-ant-test".to_string());
        let client = AnthropicClient::new(&config);

        let result = client
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.text, "Hello!");
        assert_eq!(result.usage.unwrap().total_tokens, 15);
        assert_eq!(result.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(result.provider, ProviderId::Anthropic);

        let request = request_rx.await.unwrap();
        assert!(request.contains("POST /v1/messages"));
        assert!(request.contains("x-api-key: sk-ant-test"));
        assert!(request.contains("anthropic-version: 2023-06-01"));
    }
}
