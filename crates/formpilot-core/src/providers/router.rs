//! Routes generation requests to a primary client with optional single-shot
//! failover to a fallback client.

use anyhow::{Result, anyhow};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::registry::{self, CustomProvider};
use crate::settings::Settings;

use super::build_client;
use super::types::{
    ConfigUpdate, ConnectionStatus, GenerateOptions, GenerateResponse, GenerationConfig,
    LlmClient, ProviderId,
};

/// Holds the active primary client and an optional fallback.
///
/// Clients are always rebuilt whole on any config change; a half-updated
/// client is never observable. Requests already in flight against a replaced
/// client complete or fail on their own.
pub struct LlmRouter {
    primary_config: GenerationConfig,
    primary: Box<dyn LlmClient>,
    fallback_config: Option<GenerationConfig>,
    fallback: Option<Box<dyn LlmClient>>,
    fallback_enabled: bool,
    custom_providers: Vec<CustomProvider>,
}

impl LlmRouter {
    /// Build a router from a config and the known custom providers
    pub fn new(config: GenerationConfig, custom_providers: Vec<CustomProvider>) -> Result<Self> {
        let primary = build_client(&config, &custom_providers)?;
        Ok(Self {
            primary_config: config,
            primary,
            fallback_config: None,
            fallback: None,
            fallback_enabled: false,
            custom_providers,
        })
    }

    /// Build a router from persisted settings, including the fallback
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut router = Self::new(
            settings.active_config(),
            settings.custom_providers.clone(),
        )?;
        if let Some(fallback) = &settings.fallback {
            router.set_fallback(fallback.clone())?;
            router.fallback_enabled = settings.fallback_enabled;
        }
        Ok(router)
    }

    /// Assemble a router directly from boxed clients.
    ///
    /// Rebuild operations use the providers' catalog defaults; intended for
    /// tests and callers that manage configs themselves.
    pub fn from_clients(
        primary: Box<dyn LlmClient>,
        fallback: Option<Box<dyn LlmClient>>,
    ) -> Self {
        let primary_config = registry::default_config(primary.provider())
            .unwrap_or_else(|_| registry::default_config(ProviderId::Ollama).expect("catalog default"));
        let fallback_config = fallback
            .as_ref()
            .map(|f| {
                registry::default_config(f.provider()).unwrap_or_else(|_| {
                    registry::default_config(ProviderId::Ollama).expect("catalog default")
                })
            });
        let fallback_enabled = fallback.is_some();
        Self {
            primary_config,
            primary,
            fallback_config,
            fallback,
            fallback_enabled,
            custom_providers: Vec::new(),
        }
    }

    /// Generate against the primary; on failure try the fallback once.
    ///
    /// When both fail, the PRIMARY's error is returned so the caller always
    /// learns the root cause.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<GenerateResponse> {
        debug!(
            "Routing generate to {} ({})",
            self.primary.provider(),
            self.primary.model()
        );
        match self.primary.generate(prompt, options).await {
            Ok(response) => Ok(response),
            Err(primary_err) => {
                if self.fallback_enabled {
                    if let Some(fallback) = &self.fallback {
                        warn!(
                            "Primary provider {} failed, trying fallback {}: {}",
                            self.primary.provider(),
                            fallback.provider(),
                            primary_err
                        );
                        match fallback.generate(prompt, options).await {
                            Ok(response) => {
                                info!(
                                    "Request succeeded on fallback provider {} ({})",
                                    fallback.provider(),
                                    fallback.model()
                                );
                                return Ok(response);
                            }
                            Err(fallback_err) => {
                                warn!(
                                    "Fallback provider {} also failed: {}",
                                    fallback.provider(),
                                    fallback_err
                                );
                                return Err(primary_err);
                            }
                        }
                    }
                }
                Err(primary_err)
            }
        }
    }

    /// Probe the primary's health with latency measurement; never errors
    pub async fn check_connection(&self) -> ConnectionStatus {
        Self::probe(self.primary.as_ref()).await
    }

    /// Probe primary and, when configured, fallback
    pub async fn check_all_connections(&self) -> Vec<ConnectionStatus> {
        let mut statuses = vec![Self::probe(self.primary.as_ref()).await];
        if let Some(fallback) = &self.fallback {
            statuses.push(Self::probe(fallback.as_ref()).await);
        }
        statuses
    }

    async fn probe(client: &dyn LlmClient) -> ConnectionStatus {
        let started = Instant::now();
        let connected = client.check_health().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        ConnectionStatus {
            provider: client.provider(),
            connected,
            model: client.model().to_string(),
            latency_ms: connected.then_some(latency_ms),
            error: (!connected).then(|| format!("{} health check failed", client.provider())),
        }
    }

    /// Replace the primary with a built-in provider's default configuration
    /// plus the given credential. The old client is discarded whole.
    pub fn switch_provider(&mut self, id: ProviderId, api_key: Option<String>) -> Result<()> {
        if id == ProviderId::Custom {
            return Err(anyhow!("use switch_custom_provider for custom providers"));
        }
        let mut config = registry::default_config(id)?;
        config.api_key = api_key;
        let client = build_client(&config, &self.custom_providers)?;
        info!("Switched primary provider to {} ({})", id, config.model);
        self.primary_config = config;
        self.primary = client;
        Ok(())
    }

    /// Replace the primary with a custom provider's configuration
    pub fn switch_custom_provider(&mut self, custom_id: &str, api_key: Option<String>) -> Result<()> {
        let custom = self
            .custom_providers
            .iter()
            .find(|c| c.id == custom_id)
            .ok_or_else(|| anyhow!("custom provider {custom_id} not found"))?;
        let config = custom.default_config(api_key);
        let client = build_client(&config, &self.custom_providers)?;
        info!("Switched primary provider to custom '{}'", custom.name);
        self.primary_config = config;
        self.primary = client;
        Ok(())
    }

    /// Merge a partial update into the primary config and rebuild its client
    pub fn update_config(&mut self, update: &ConfigUpdate) -> Result<()> {
        let mut config = self.primary_config.clone();
        update.apply(&mut config);
        let client = build_client(&config, &self.custom_providers)?;
        self.primary_config = config;
        self.primary = client;
        Ok(())
    }

    /// Merge a partial update into the fallback config and rebuild its client
    pub fn update_fallback_config(&mut self, update: &ConfigUpdate) -> Result<()> {
        let Some(current) = &self.fallback_config else {
            return Err(anyhow!("no fallback provider configured"));
        };
        let mut config = current.clone();
        update.apply(&mut config);
        let client = build_client(&config, &self.custom_providers)?;
        self.fallback_config = Some(config);
        self.fallback = Some(client);
        Ok(())
    }

    /// Configure (and enable) a fallback provider
    pub fn set_fallback(&mut self, config: GenerationConfig) -> Result<()> {
        let client = build_client(&config, &self.custom_providers)?;
        self.fallback_config = Some(config);
        self.fallback = Some(client);
        self.fallback_enabled = true;
        Ok(())
    }

    /// Drop the fallback provider entirely
    pub fn clear_fallback(&mut self) {
        self.fallback_config = None;
        self.fallback = None;
        self.fallback_enabled = false;
    }

    pub fn set_fallback_enabled(&mut self, enabled: bool) {
        self.fallback_enabled = enabled;
    }

    pub fn provider(&self) -> ProviderId {
        self.primary.provider()
    }

    pub fn model(&self) -> &str {
        self.primary.model()
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.primary_config
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Mock client that succeeds with a fixed text
    #[derive(Debug)]
    struct SuccessClient {
        provider: ProviderId,
        text: String,
    }

    #[async_trait]
    impl LlmClient for SuccessClient {
        fn provider(&self) -> ProviderId {
            self.provider
        }
        fn model(&self) -> &str {
            "mock-model"
        }
        async fn check_health(&self) -> bool {
            true
        }
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<GenerateResponse> {
            Ok(GenerateResponse {
                text: self.text.clone(),
                model: "mock-model".to_string(),
                provider: self.provider,
                usage: None,
                finish_reason: Some("stop".to_string()),
                latency_ms: 1,
            })
        }
    }

    /// Mock client that always fails
    #[derive(Debug)]
    struct FailClient {
        provider: ProviderId,
        error: String,
    }

    #[async_trait]
    impl LlmClient for FailClient {
        fn provider(&self) -> ProviderId {
            self.provider
        }
        fn model(&self) -> &str {
            "fail-model"
        }
        async fn check_health(&self) -> bool {
            false
        }
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<GenerateResponse> {
            Err(anyhow!("{}", self.error))
        }
    }

    fn success(provider: ProviderId, text: &str) -> Box<dyn LlmClient> {
        Box::new(SuccessClient {
            provider,
            text: text.to_string(),
        })
    }

    fn fail(provider: ProviderId, error: &str) -> Box<dyn LlmClient> {
        Box::new(FailClient {
            provider,
            error: error.to_string(),
        })
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let router = LlmRouter::from_clients(
            success(ProviderId::Ollama, "primary wins"),
            Some(success(ProviderId::Groq, "fallback")),
        );
        let response = router.generate("hi", &GenerateOptions::default()).await.unwrap();
        assert_eq!(response.text, "primary wins");
        assert_eq!(response.provider, ProviderId::Ollama);
    }

    #[tokio::test]
    async fn test_failover_uses_fallback_response() {
        let router = LlmRouter::from_clients(
            fail(ProviderId::OpenAi, "primary down"),
            Some(success(ProviderId::Groq, "saved by fallback")),
        );
        let response = router.generate("hi", &GenerateOptions::default()).await.unwrap();
        assert_eq!(response.text, "saved by fallback");
        assert_eq!(response.provider, ProviderId::Groq);
    }

    #[tokio::test]
    async fn test_both_fail_returns_primary_error() {
        let router = LlmRouter::from_clients(
            fail(ProviderId::OpenAi, "primary root cause"),
            Some(fail(ProviderId::Groq, "fallback noise")),
        );
        let err = router
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "primary root cause");
    }

    #[tokio::test]
    async fn test_no_fallback_propagates_primary_error() {
        let router = LlmRouter::from_clients(fail(ProviderId::Anthropic, "boom"), None);
        let err = router
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_disabled_fallback_is_not_tried() {
        let mut router = LlmRouter::from_clients(
            fail(ProviderId::OpenAi, "primary down"),
            Some(success(ProviderId::Groq, "fallback")),
        );
        router.set_fallback_enabled(false);
        let err = router
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "primary down");
    }

    #[tokio::test]
    async fn test_check_connection_never_errors() {
        let router = LlmRouter::from_clients(fail(ProviderId::Gemini, "unreachable"), None);
        let status = router.check_connection().await;
        assert!(!status.connected);
        assert_eq!(status.provider, ProviderId::Gemini);
        assert!(status.error.is_some());
        assert!(status.latency_ms.is_none());
    }

    #[tokio::test]
    async fn test_check_all_connections_includes_fallback() {
        let router = LlmRouter::from_clients(
            success(ProviderId::Ollama, "ok"),
            Some(fail(ProviderId::OpenAi, "down")),
        );
        let statuses = router.check_all_connections().await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].connected);
        assert!(statuses[0].latency_ms.is_some());
        assert!(!statuses[1].connected);
    }

    #[test]
    fn test_switch_provider_every_builtin() {
        let mut router = LlmRouter::from_clients(success(ProviderId::Ollama, "x"), None);
        for id in ProviderId::BUILTIN {
            router.switch_provider(id, Some("key".to_string())).unwrap();
            assert_eq!(router.provider(), id);
            assert_eq!(router.config().provider, id);
        }
    }

    #[test]
    fn test_switch_provider_rejects_custom_id() {
        let mut router = LlmRouter::from_clients(success(ProviderId::Ollama, "x"), None);
        assert!(router.switch_provider(ProviderId::Custom, None).is_err());
    }

    #[test]
    fn test_update_config_rebuilds_client() {
        let mut router = LlmRouter::from_clients(success(ProviderId::Ollama, "x"), None);
        router.switch_provider(ProviderId::Ollama, None).unwrap();
        let update = ConfigUpdate {
            model: Some("mistral".to_string()),
            ..Default::default()
        };
        router.update_config(&update).unwrap();
        assert_eq!(router.model(), "mistral");
        assert_eq!(router.config().model, "mistral");
    }

    #[test]
    fn test_update_config_rejects_invalid_values() {
        let mut router = LlmRouter::from_clients(success(ProviderId::Ollama, "x"), None);
        router.switch_provider(ProviderId::Ollama, None).unwrap();
        let update = ConfigUpdate {
            temperature: Some(3.0),
            ..Default::default()
        };
        assert!(router.update_config(&update).is_err());
        // previous config is untouched
        assert_eq!(router.config().temperature, 0.7);
    }

    #[test]
    fn test_update_fallback_requires_fallback() {
        let mut router = LlmRouter::from_clients(success(ProviderId::Ollama, "x"), None);
        let err = router
            .update_fallback_config(&ConfigUpdate::default())
            .unwrap_err();
        assert!(err.to_string().contains("no fallback"));
    }

    #[tokio::test]
    async fn test_clear_fallback_disables_failover() {
        let mut router = LlmRouter::from_clients(fail(ProviderId::OpenAi, "primary down"), None);
        router
            .set_fallback(registry::default_config(ProviderId::Ollama).unwrap())
            .unwrap();
        assert!(router.has_fallback());

        router.clear_fallback();
        assert!(!router.has_fallback());
        let err = router
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "primary down");
        assert_eq!(router.check_all_connections().await.len(), 1);
    }

    #[test]
    fn test_switch_custom_provider() {
        let custom =
            CustomProvider::new("local-proxy", "", "http://localhost:8080/v1", false, vec![]);
        let config = registry::default_config(ProviderId::Ollama).unwrap();
        let mut router = LlmRouter::new(config, vec![custom.clone()]).unwrap();
        router.switch_custom_provider(&custom.id, None).unwrap();
        assert_eq!(router.provider(), ProviderId::Custom);
        assert_eq!(
            router.config().custom_provider_id.as_deref(),
            Some(custom.id.as_str())
        );
        assert!(router.switch_custom_provider("missing", None).is_err());
    }
}
