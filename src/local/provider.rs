//! Embedding and completion provider.
//!
//! Any OpenAI-compatible HTTP API works; the base URL and models come from
//! [`LocalConfig`].

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::LocalConfig;

/// Provider call failure. Success, rate limiting and everything else stay
/// distinguishable so callers can pick a retry policy.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited,

    #[error("provider failure{}: {message}", format_status(.status))]
    Failure {
        status: Option<u16>,
        message: String,
    },
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl ProviderError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Failure {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Remote embedding/completion service.
pub trait Provider: Send + Sync {
    /// Embed `text` into a vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, ProviderError>> + Send;

    /// Run a chat completion with a system and a user message.
    fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// Provider backed by an OpenAI-compatible HTTP API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    embedding_model: String,
    completion_model: String,
}

impl OpenAiProvider {
    /// Build a provider from config. Fails if no API key is configured.
    pub fn from_config(config: &LocalConfig) -> anyhow::Result<Self> {
        let api_key = config
            .openai_api_key_secret()
            .context("OpenAI API key not configured. Run: contaxt config set-key <key>")?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            completion_model: config.completion_model.clone(),
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/v1/{}", self.base_url, endpoint))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        let result = classify(status, text);
        if let Err(ProviderError::RateLimited) = result {
            debug!(endpoint, "provider rate limited");
        }
        result
    }
}

/// Map an HTTP status to the body on success, `RateLimited` on 429, and a
/// `Failure` carrying the status for anything else.
fn classify(status: StatusCode, body: String) -> Result<String, ProviderError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }

    if !status.is_success() {
        return Err(ProviderError::Failure {
            status: Some(status.as_u16()),
            message: body,
        });
    }

    Ok(body)
}

impl Provider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = self
            .post(
                "embeddings",
                serde_json::json!({
                    "model": self.embedding_model,
                    "input": text,
                }),
            )
            .await?;

        parse_embedding(&body)
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let body = self
            .post(
                "chat/completions",
                serde_json::json!({
                    "model": self.completion_model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": user},
                    ],
                    "max_tokens": max_tokens,
                }),
            )
            .await?;

        parse_completion(&body)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

fn parse_embedding(body: &str) -> Result<Vec<f32>, ProviderError> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::failure(format!("invalid embeddings response: {}", e)))?;

    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::failure("no embedding returned"))
}

fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::failure(format!("invalid completion response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| ProviderError::failure("no completion content returned"))
}
