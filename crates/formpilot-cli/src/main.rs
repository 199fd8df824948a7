use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use formpilot_core::providers::types::mask_secret;
use formpilot_core::{
    CustomProvider, GenerateOptions, LlmRouter, ProviderId, SettingsStore, registry,
};

#[derive(Parser)]
#[command(name = "formpilot")]
#[command(version)]
#[command(about = "formpilot — LLM provider routing for job-application autofill")]
struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in and custom providers
    Providers,

    /// Switch the active provider
    Use {
        /// Provider id (ollama, anthropic, openai, gemini, openrouter, groq)
        /// or a custom provider's uuid
        provider: String,

        /// API key for the provider
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Health-check the active (and fallback) providers
    Check,

    /// Run a one-shot generation against the active provider
    Generate {
        /// The prompt text
        prompt: String,

        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,
    },

    /// Score how well a profile matches a job posting
    Score {
        /// Job description text
        #[arg(long)]
        job: String,

        /// Candidate profile text
        #[arg(long)]
        profile: String,
    },

    /// Manage custom OpenAI-compatible providers
    Custom {
        #[command(subcommand)]
        command: CustomCommands,
    },

    /// Show the active configuration
    Config,
}

#[derive(Subcommand)]
enum CustomCommands {
    /// Register a custom provider
    Add {
        name: String,

        /// Endpoint root, e.g. http://localhost:1234/v1
        #[arg(long)]
        base_url: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Whether the endpoint needs an API key
        #[arg(long)]
        requires_api_key: bool,
    },

    /// Remove a custom provider by id
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let store = match &cli.settings {
        Some(path) => SettingsStore::at(path.clone()),
        None => SettingsStore::new()?,
    };

    match cli.command {
        Commands::Providers => cmd_providers(&store),
        Commands::Use { provider, api_key } => cmd_use(&store, &provider, api_key),
        Commands::Check => cmd_check(&store).await,
        Commands::Generate { prompt, system } => cmd_generate(&store, &prompt, system).await,
        Commands::Score { job, profile } => cmd_score(&store, &job, &profile).await,
        Commands::Custom { command } => match command {
            CustomCommands::Add {
                name,
                base_url,
                description,
                requires_api_key,
            } => cmd_custom_add(&store, &name, &base_url, &description, requires_api_key),
            CustomCommands::Remove { id } => cmd_custom_remove(&store, &id),
        },
        Commands::Config => cmd_config(&store),
    }
}

fn cmd_providers(store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;
    println!("Built-in providers:");
    for info in registry::all_providers() {
        let key = if info.requires_api_key { "api key" } else { "no key" };
        let free = if info.is_free { ", free tier" } else { "" };
        println!(
            "  {:<12} {} ({}{}) — default model {}",
            info.id.to_string(),
            info.name,
            key,
            free,
            info.default_model
        );
    }
    if !settings.custom_providers.is_empty() {
        println!("Custom providers:");
        for custom in &settings.custom_providers {
            println!("  {:<12} {} — {}", custom.id, custom.name, custom.base_url);
        }
    }
    Ok(())
}

fn cmd_use(store: &SettingsStore, provider: &str, api_key: Option<String>) -> Result<()> {
    let settings = store.load()?;
    let config = match provider.parse::<ProviderId>() {
        Ok(ProviderId::Custom) | Err(_) => {
            // Treat anything that is not a built-in id as a custom provider id
            let custom = settings
                .custom_providers
                .iter()
                .find(|c| c.id == provider || c.name == provider)
                .ok_or_else(|| anyhow::anyhow!("unknown provider: {provider}"))?;
            custom.default_config(api_key)
        }
        Ok(id) => {
            let mut config = registry::default_config(id)?;
            config.api_key = api_key;
            config
        }
    };
    info!("Switching active provider to {} ({})", config.provider, config.model);
    println!("Active provider set to {} ({})", config.provider, config.model);
    store.update_active(config)
}

async fn cmd_check(store: &SettingsStore) -> Result<()> {
    let router = router_from(store)?;
    for status in router.check_all_connections().await {
        if !status.connected {
            warn!(
                "Provider {} is unreachable: {}",
                status.provider,
                status.error.as_deref().unwrap_or("unknown")
            );
        }
        let state = if status.connected {
            format!("connected ({} ms)", status.latency_ms.unwrap_or(0))
        } else {
            format!("DOWN — {}", status.error.as_deref().unwrap_or("unknown"))
        };
        println!("{:<12} {:<28} {}", status.provider.to_string(), status.model, state);
    }
    Ok(())
}

async fn cmd_generate(store: &SettingsStore, prompt: &str, system: Option<String>) -> Result<()> {
    let router = router_from(store)?;
    let options = GenerateOptions {
        system,
        ..Default::default()
    };
    let response = router.generate(prompt, &options).await?;
    println!("{}", response.text);
    if let Some(usage) = response.usage {
        eprintln!(
            "[{} {} | {} tokens | {} ms]",
            response.provider, response.model, usage.total_tokens, response.latency_ms
        );
    }
    Ok(())
}

async fn cmd_score(store: &SettingsStore, job: &str, profile: &str) -> Result<()> {
    let router = router_from(store)?;
    let score = router.relevance_score(job, profile).await?;
    println!("{score}");
    Ok(())
}

fn cmd_custom_add(
    store: &SettingsStore,
    name: &str,
    base_url: &str,
    description: &str,
    requires_api_key: bool,
) -> Result<()> {
    let provider = CustomProvider::new(name, description, base_url, requires_api_key, vec![]);
    println!("Added custom provider '{}' with id {}", provider.name, provider.id);
    store.add_custom_provider(provider)
}

fn cmd_custom_remove(store: &SettingsStore, id: &str) -> Result<()> {
    store.delete_custom_provider(id)?;
    println!("Removed custom provider {id}");
    Ok(())
}

fn cmd_config(store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;
    let config = settings.active_config();
    println!("provider:    {}", config.provider);
    if let Some(id) = &config.custom_provider_id {
        println!("custom id:   {id}");
    }
    println!("model:       {}", config.model);
    println!("base url:    {}", config.base_url);
    println!(
        "api key:     {}",
        config.api_key.as_deref().map(mask_secret).unwrap_or_else(|| "(none)".to_string())
    );
    println!("max tokens:  {}", config.max_tokens);
    println!("temperature: {}", config.temperature);
    println!("timeout:     {} ms", config.timeout_ms);
    println!(
        "fallback:    {}",
        match &settings.fallback {
            Some(f) if settings.fallback_enabled => format!("{} ({})", f.provider, f.model),
            Some(f) => format!("{} ({}, disabled)", f.provider, f.model),
            None => "none".to_string(),
        }
    );
    Ok(())
}

fn router_from(store: &SettingsStore) -> Result<LlmRouter> {
    let settings = store.load()?;
    LlmRouter::from_settings(&settings)
}
