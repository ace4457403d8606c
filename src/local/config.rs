//! Local configuration management.
//!
//! Config is stored at `~/.config/contaxt/config.toml` and contains:
//! - OpenAI-compatible API credentials and models
//! - Rate-limit retry and request timeout settings
//! - The last repository indexed

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::annotator::RetryPolicy;

const CONFIG_DIR: &str = "contaxt";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Local configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// OpenAI API key for embeddings and completions.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible API (default: https://api.openai.com).
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Model to use for embeddings (default: text-embedding-3-small).
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Dimension of the embedding model's vectors.
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: i32,

    /// Model used for chunk explanations and answers (default: gpt-4o).
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Token cap for every completion request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Seconds to wait after a rate-limit response before resubmitting.
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,

    /// Maximum attempts per request while rate limited (unset = unbounded).
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,

    /// HTTP request timeout in seconds (unset = no timeout).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Repository indexed most recently.
    #[serde(default)]
    pub repo_path: Option<PathBuf>,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> i32 {
    super::models::DEFAULT_VECTOR_DIM
}

fn default_completion_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_rate_limit_backoff_secs() -> u64 {
    120
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            completion_model: default_completion_model(),
            max_tokens: default_max_tokens(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            max_rate_limit_retries: None,
            request_timeout_secs: None,
            repo_path: None,
        }
    }
}

impl LocalConfig {
    /// Load config from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;

        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&path, content).context("Failed to write config file")
    }

    /// Get the OpenAI API key as a SecretString.
    ///
    /// `OPENAI_API_KEY` takes precedence over the stored key.
    pub fn openai_api_key_secret(&self) -> Option<SecretString> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.openai_api_key.clone().filter(|k| !k.is_empty()))
            .map(SecretString::from)
    }

    /// Check if the config has a valid OpenAI API key.
    pub fn has_openai_key(&self) -> bool {
        self.openai_api_key_secret().is_some()
    }

    /// Set the OpenAI API key.
    pub fn set_openai_key(&mut self, key: String) {
        self.openai_api_key = Some(key);
    }

    /// Retry policy for rate-limited provider calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_secs(self.rate_limit_backoff_secs),
            max_attempts: self.max_rate_limit_retries,
        }
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}
