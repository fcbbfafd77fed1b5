//! Client for the remote text-completion provider.
//!
//! Two wire formats are supported:
//!
//! | Format      | Endpoint                              | Text is read from                 |
//! |-------------|---------------------------------------|-----------------------------------|
//! | `Responses` | `POST {base}/openai/v1/responses`     | `output[0].content[0].text`       |
//! | `Chat`      | `POST {base}/openrouter/v1/chat/completions` | `choices[0].message.content` |
//!
//! Every call is retried with exponential backoff (`base * 2^attempt`, no
//! sleep after the final attempt). A `200` whose body lacks the expected
//! fields is not an error: the whole decoded body is returned as text.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::{ENV_COMPLETION_API_KEY, Settings};
use crate::errors::{CompletionError, ConfigError};
use crate::util::Sleeper;

/// Maximum characters of an error body echoed into the log.
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// Single `input` string (format A).
    #[default]
    Responses,
    /// Chat-message array (format B).
    Chat,
}

impl fmt::Display for ApiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFormat::Responses => write!(f, "responses"),
            ApiFormat::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for ApiFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "responses" => Ok(ApiFormat::Responses),
            "chat" => Ok(ApiFormat::Chat),
            _ => anyhow::bail!("Invalid completion format '{}'. Valid values: responses, chat", s),
        }
    }
}

/// Abstraction over text completion for testability.
/// Real implementation: `CompletionClient`.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        format: ApiFormat,
    ) -> Result<String, CompletionError>;
}

pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff_base: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl CompletionClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        max_retries: u32,
        backoff_base: Duration,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CompletionError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries,
            backoff_base,
            sleeper,
        })
    }

    pub fn from_settings(
        settings: &Settings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, CompletionError> {
        Self::new(
            &settings.completion.base_url,
            &settings.secrets.completion_api_key,
            settings.timings.completion_timeout(),
            settings.timings.completion_max_retries,
            settings.timings.completion_backoff_base(),
            sleeper,
        )
    }

    fn request_for(&self, prompt: &str, model: &str, format: ApiFormat) -> (String, Value) {
        match format {
            ApiFormat::Responses => (
                format!("{}/openai/v1/responses", self.base_url),
                json!({ "model": model, "input": prompt }),
            ),
            ApiFormat::Chat => (
                format!("{}/openrouter/v1/chat/completions", self.base_url),
                json!({
                    "model": format!("openai/{}", model),
                    "messages": [{ "role": "user", "content": prompt }],
                }),
            ),
        }
    }

    /// Call the provider, retrying up to `max_retries` times.
    pub async fn complete_with_retries(
        &self,
        prompt: &str,
        model: &str,
        max_retries: u32,
        format: ApiFormat,
    ) -> Result<String, CompletionError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingVar(ENV_COMPLETION_API_KEY).into());
        }

        let (url, payload) = self.request_for(prompt, model, format);

        for attempt in 0..max_retries {
            debug!(attempt = attempt + 1, %url, model, "Calling completion provider");
            match self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) if resp.status() == StatusCode::OK => match resp.json::<Value>().await {
                    Ok(body) => return Ok(extract_text(&body, format)),
                    Err(e) => warn!(
                        attempt = attempt + 1,
                        "Completion response was not valid JSON: {}", e
                    ),
                },
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        attempt = attempt + 1,
                        status = status.as_u16(),
                        "Completion provider returned {}: {}",
                        status,
                        preview(&body)
                    );
                }
                Err(e) => warn!(attempt = attempt + 1, "Completion request failed: {}", e),
            }

            if attempt + 1 < max_retries {
                self.sleeper
                    .sleep(backoff_delay(self.backoff_base, attempt))
                    .await;
            }
        }

        Err(CompletionError::Exhausted {
            attempts: max_retries,
        })
    }
}

#[async_trait]
impl Completer for CompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        format: ApiFormat,
    ) -> Result<String, CompletionError> {
        self.complete_with_retries(prompt, model, self.max_retries, format)
            .await
    }
}

/// `base * 2^attempt`, saturating instead of overflowing.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Read the completion text out of a decoded response body.
pub fn extract_text(body: &Value, format: ApiFormat) -> String {
    let found = match format {
        ApiFormat::Responses => body
            .get("output")
            .and_then(|o| o.get(0))
            .and_then(|item| item.get("content"))
            .and_then(|c| c.get(0))
            .map(|part| {
                part.get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string()
            }),
        ApiFormat::Chat => body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string),
    };

    found.unwrap_or_else(|| {
        let keys: Vec<&str> = body
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        warn!(?keys, "Unexpected completion response structure, returning raw body");
        body.to_string()
    })
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}
