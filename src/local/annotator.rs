//! Chunk annotation and embedding through the provider.
//!
//! Every provider call goes through one retry loop: rate limiting waits a
//! fixed back-off and resubmits the identical request, any other failure
//! degrades immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::provider::{Provider, ProviderError};

const EXPLAIN_SYSTEM_PROMPT: &str = "You are a helpful code explainer. \n\
Respond with just clear and concise explanation of the code chunk provided to you. \n\
You maybe optionally provided with the whole file content to better describe the code chunk. \n\
Make sure the explanation is not more than 4 lines.";

/// How rate-limited requests are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait before resubmitting after a rate-limit response.
    pub backoff: Duration,
    /// Total attempts allowed per request; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(120),
            max_attempts: None,
        }
    }
}

/// Result of a provider request after retries.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    /// The provider could not deliver; the caller decides how to proceed.
    Degraded { reason: String },
}

#[cfg(test)]
impl<T> Outcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            Outcome::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }
}

/// Asks the provider for chunk explanations and embeddings.
pub struct Annotator<P> {
    provider: P,
    policy: RetryPolicy,
    max_tokens: u32,
}

impl<P: Provider> Annotator<P> {
    pub fn new(provider: P, policy: RetryPolicy, max_tokens: u32) -> Self {
        Self {
            provider,
            policy,
            max_tokens,
        }
    }

    /// Short natural-language description of `chunk`, optionally using the
    /// whole file as context.
    pub async fn annotate(&self, chunk: &str, whole_file: Option<&str>) -> Outcome<String> {
        let prompt = explain_prompt(chunk, whole_file);
        let user = prompt.as_str();
        self.with_retry("annotate", || {
            self.provider
                .complete(EXPLAIN_SYSTEM_PROMPT, user, self.max_tokens)
        })
        .await
    }

    /// Embedding vector for `text`.
    pub async fn embed(&self, text: &str) -> Outcome<Vec<f32>> {
        self.with_retry("embed", || self.provider.embed(text)).await
    }

    /// Free-form completion under the same retry policy.
    pub async fn complete(&self, system: &str, user: &str) -> Outcome<String> {
        self.with_retry("complete", || {
            self.provider.complete(system, user, self.max_tokens)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, request: &'static str, mut call: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Outcome::Ok(value),
                Err(ProviderError::RateLimited) => {
                    if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                        warn!(request, attempt, "rate limited, giving up");
                        return Outcome::Degraded {
                            reason: format!("rate limited after {} attempts", attempt),
                        };
                    }
                    warn!(
                        request,
                        attempt,
                        backoff_secs = self.policy.backoff.as_secs(),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    warn!(request, error = %e, "provider request failed");
                    return Outcome::Degraded {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// Text handed to the embedder for one record: path, description, then the
/// raw content.
pub fn embedding_text(path: &str, explanation: &str, content: &str) -> String {
    format!(
        "File Path: {}\nContent Description: {}\nFile Content: {}",
        path, explanation, content
    )
}

fn explain_prompt(chunk: &str, whole_file: Option<&str>) -> String {
    match whole_file {
        Some(file) => format!("file: {}\n\n chunk:```{}```", file.trim(), chunk.trim()),
        None => format!("code:\n ```{}```", chunk.trim()),
    }
}
