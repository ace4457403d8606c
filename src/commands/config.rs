//! Config command - manage local configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::local::{API_KEY_ENV, LocalConfig};

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub command: ConfigSubCmd,
}

#[derive(Subcommand)]
pub enum ConfigSubCmd {
    /// Set the API key for embeddings and completions
    SetKey(SetKeyCmd),

    /// Set the API base URL (default: https://api.openai.com)
    SetUrl(SetUrlCmd),

    /// Set the embedding model and its vector dimension
    SetModel(SetModelCmd),

    /// Set the completion model used for explanations and answers (default: gpt-4o)
    SetChatModel(SetChatModelCmd),

    /// Show current configuration
    Show,
}

#[derive(Args)]
pub struct SetKeyCmd {
    /// API key (OpenAI or any compatible provider)
    pub key: String,
}

#[derive(Args)]
pub struct SetUrlCmd {
    /// API base URL (e.g., https://openrouter.ai/api)
    pub url: String,
}

#[derive(Args)]
pub struct SetModelCmd {
    /// Embedding model name (e.g., text-embedding-3-small)
    pub model: String,

    /// Vector dimension produced by the model
    #[arg(long, short)]
    pub dimensions: Option<i32>,
}

#[derive(Args)]
pub struct SetChatModelCmd {
    /// Completion model name (e.g., gpt-4o)
    pub model: String,
}

impl ConfigCmd {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            ConfigSubCmd::SetKey(cmd) => {
                let mut config = LocalConfig::load()?;
                config.set_openai_key(cmd.key.clone());
                config.save()?;
                println!("API key saved.");
            }
            ConfigSubCmd::SetUrl(cmd) => {
                let mut config = LocalConfig::load()?;
                config.openai_base_url = cmd.url.clone();
                config.save()?;
                println!("Base URL set to: {}", cmd.url);
            }
            ConfigSubCmd::SetModel(cmd) => {
                let mut config = LocalConfig::load()?;
                config.embedding_model = cmd.model.clone();
                if let Some(dimensions) = cmd.dimensions {
                    config.embedding_dimensions = dimensions;
                }
                config.save()?;
                println!(
                    "Embedding model set to: {} ({} dimensions)",
                    cmd.model, config.embedding_dimensions
                );
                println!("Run `contaxt clean` before reindexing if the dimension changed.");
            }
            ConfigSubCmd::SetChatModel(cmd) => {
                let mut config = LocalConfig::load()?;
                config.completion_model = cmd.model.clone();
                config.save()?;
                println!("Completion model set to: {}", cmd.model);
            }
            ConfigSubCmd::Show => {
                let config = LocalConfig::load()?;
                println!("Config: {}", LocalConfig::config_path()?.display());
                println!();
                println!(
                    "api_key:      {}",
                    if config.has_openai_key() {
                        "(set)"
                    } else {
                        "(not set)"
                    }
                );
                if std::env::var(API_KEY_ENV).is_ok_and(|k| !k.is_empty()) {
                    println!("              (from {})", API_KEY_ENV);
                }
                println!("base_url:     {}", config.openai_base_url);
                println!(
                    "model:        {} ({} dimensions)",
                    config.embedding_model, config.embedding_dimensions
                );
                println!("chat_model:   {}", config.completion_model);
                println!("max_tokens:   {}", config.max_tokens);
                println!(
                    "backoff:      {}s, {}",
                    config.rate_limit_backoff_secs,
                    match config.max_rate_limit_retries {
                        Some(n) => format!("at most {} attempts", n),
                        None => "unbounded attempts".to_string(),
                    }
                );
                if let Some(secs) = config.request_timeout_secs {
                    println!("timeout:      {}s", secs);
                }
                if let Some(repo) = &config.repo_path {
                    println!("repository:   {}", repo.display());
                }
            }
        }
        Ok(())
    }
}
