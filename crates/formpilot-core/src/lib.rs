//! formpilot-core - LLM routing for the formpilot job-application assistant
//!
//! This crate provides:
//! - One client per text-generation backend (Ollama, Anthropic, Gemini, and
//!   the OpenAI-compatible family including custom endpoints)
//! - A static provider catalog with per-provider default configurations
//! - A router with health checks and primary-to-fallback failover
//! - Prompt builders and response parsers for the application-assist tasks
//! - A JSON settings store for the active config and custom providers

pub mod prompts;
pub mod providers;
pub mod registry;
pub mod settings;

// Re-export main types for convenience
pub use providers::{
    ConfigUpdate, ConnectionStatus, GenerateOptions, GenerateResponse, GenerationConfig,
    LlmClient, LlmRouter, ProviderId, TokenUsage, build_client,
};
pub use registry::{CustomProvider, ModelInfo, ProviderInfo, all_providers, default_config};
pub use settings::{Settings, SettingsStore};
