use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ExtractionError, OracleError};

const DEFAULT_MODEL: &str = "gpt-5.2";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Anything that can turn a prompt into free-form text.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;
}

#[async_trait]
impl<O: Oracle + ?Sized> Oracle for Arc<O> {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        (**self).generate(prompt).await
    }
}

/// Stateless OpenAI chat-completions client. Every prompt is a fresh conversation.
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiOracle {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY`, plus optional `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY not set in environment"))?;

        let mut oracle = Self::new(api_key);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            oracle = oracle.with_model(model);
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            oracle.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(oracle)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": 0.2,
            }))
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }

        let json_resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error")
                .to_string();
            warn!(status = status.as_u16(), %message, "oracle API error");
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let content = json_resp["choices"][0]["message"]["content"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyReply)?;

        debug!(reply = content, "oracle replied");
        Ok(content.to_string())
    }
}

/// Retries a rate-limited call once after `backoff`. Other failures pass straight through.
pub struct RateLimitRetry<O> {
    inner: O,
    backoff: Duration,
}

impl<O: Oracle> RateLimitRetry<O> {
    pub fn new(inner: O, backoff: Duration) -> Self {
        Self { inner, backoff }
    }
}

#[async_trait]
impl<O: Oracle> Oracle for RateLimitRetry<O> {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        match self.inner.generate(prompt).await {
            Err(e) if e.is_rate_limited() => {
                warn!(backoff = ?self.backoff, "rate limited, backing off before retry");
                tokio::time::sleep(self.backoff).await;
                self.inner.generate(prompt).await
            }
            other => other,
        }
    }
}

/// Best-effort extraction: everything from the first `{` to the last `}`.
///
/// Tolerates prose and markdown fences around the object.
pub fn extract_json(text: &str) -> Result<&str, ExtractionError> {
    let start = text.find('{').ok_or(ExtractionError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ExtractionError::NoJsonObject)?;
    if end < start {
        return Err(ExtractionError::NoJsonObject);
    }
    Ok(&text[start..=end])
}

pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, ExtractionError> {
    let object = extract_json(text)?;
    Ok(serde_json::from_str(object)?)
}
