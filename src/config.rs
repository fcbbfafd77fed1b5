//! Immutable service configuration.
//!
//! `Settings` is assembled once at startup and passed (behind an `Arc`) to
//! every component that needs it. Layers, lowest to highest precedence:
//! built-in defaults → TOML file → environment → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [completion]
//! base_url = "https://aipipe.org"
//! app_model = "gpt-4o"
//! readme_model = "gpt-4o-mini"
//! format = "responses"
//!
//! [github]
//! api_base = "https://api.github.com"
//!
//! [pipeline]
//! pages_poll_attempts = 30
//! pages_poll_interval_secs = 10
//! settle_round_one_secs = 30
//! settle_round_two_secs = 15
//! ```
//!
//! Secrets are never read from the file, only from the environment
//! (`MY_SECRET`, `GITHUB_TOKEN`, `GITHUB_USERNAME`, `AIPIPE_API_KEY`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::llm::ApiFormat;

/// File used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "launchpad.toml";

pub const ENV_SHARED_SECRET: &str = "MY_SECRET";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_GITHUB_USERNAME: &str = "GITHUB_USERNAME";
pub const ENV_COMPLETION_API_KEY: &str = "AIPIPE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionSettings {
    pub base_url: String,
    /// Model used for the application artifact.
    pub app_model: String,
    /// Smaller model used for the README.
    pub readme_model: String,
    pub format: ApiFormat,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://aipipe.org".to_string(),
            app_model: "gpt-4o".to_string(),
            readme_model: "gpt-4o-mini".to_string(),
            format: ApiFormat::Responses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSettings {
    pub api_base: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
        }
    }
}

/// Retry, poll and delay bounds for the pipeline.
///
/// Counts are attempts, everything else is whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timings {
    pub completion_timeout_secs: u64,
    pub completion_max_retries: u32,
    /// Sleep after attempt `n` is `base * 2^n`.
    pub completion_backoff_base_secs: u64,
    /// Per-request bound on every hosting API call.
    pub github_timeout_secs: u64,
    pub naming_max_attempts: u32,
    pub propagation_delay_secs: u64,
    pub pages_poll_attempts: u32,
    pub pages_poll_interval_secs: u64,
    pub pages_probe_timeout_secs: u64,
    pub settle_round_one_secs: u64,
    pub settle_round_two_secs: u64,
    pub notify_max_retries: u32,
    pub notify_initial_backoff_secs: u64,
    pub notify_timeout_secs: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            completion_timeout_secs: 120,
            completion_max_retries: 3,
            completion_backoff_base_secs: 1,
            github_timeout_secs: 15,
            naming_max_attempts: 10,
            propagation_delay_secs: 2,
            pages_poll_attempts: 30,
            pages_poll_interval_secs: 10,
            pages_probe_timeout_secs: 10,
            settle_round_one_secs: 30,
            settle_round_two_secs: 15,
            notify_max_retries: 5,
            notify_initial_backoff_secs: 1,
            notify_timeout_secs: 30,
        }
    }
}

impl Timings {
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn completion_backoff_base(&self) -> Duration {
        Duration::from_secs(self.completion_backoff_base_secs)
    }

    pub fn github_timeout(&self) -> Duration {
        Duration::from_secs(self.github_timeout_secs)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_secs(self.propagation_delay_secs)
    }

    pub fn pages_poll_interval(&self) -> Duration {
        Duration::from_secs(self.pages_poll_interval_secs)
    }

    pub fn pages_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.pages_probe_timeout_secs)
    }

    pub fn notify_initial_backoff(&self) -> Duration {
        Duration::from_secs(self.notify_initial_backoff_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.completion_max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.completion_max_retries",
                message: "must be at least 1".to_string(),
            });
        }
        if self.notify_max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.notify_max_retries",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Credentials read from the environment.
#[derive(Clone)]
pub struct Secrets {
    pub shared_secret: String,
    pub github_token: String,
    pub github_username: String,
    pub completion_api_key: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("shared_secret", &"<redacted>")
            .field("github_token", &"<redacted>")
            .field("github_username", &self.github_username)
            .field("completion_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(key))
        };
        Ok(Self {
            shared_secret: require(ENV_SHARED_SECRET)?,
            github_token: require(ENV_GITHUB_TOKEN)?,
            github_username: require(ENV_GITHUB_USERNAME)?,
            completion_api_key: require(ENV_COMPLETION_API_KEY)?,
        })
    }
}

/// The non-secret part of the configuration, as stored in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSettings,
    pub completion: CompletionSettings,
    pub github: GitHubSettings,
    pub pipeline: Timings,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit file, or the default file if it exists, or defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match explicit {
            Some(path) => Ok((Self::from_path(path)?, Some(path.to_path_buf()))),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Ok((Self::from_path(&default_path)?, Some(default_path)))
                } else {
                    Ok((Self::default(), None))
                }
            }
        }
    }
}

/// Process-wide, read-only configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub completion: CompletionSettings,
    pub github: GitHubSettings,
    pub timings: Timings,
    pub secrets: Secrets,
    /// File the settings were read from, if any.
    pub source: Option<PathBuf>,
}

impl Settings {
    pub fn new(file: FileConfig, secrets: Secrets, source: Option<PathBuf>) -> Result<Self, ConfigError> {
        file.pipeline.validate()?;
        Ok(Self {
            server: file.server,
            completion: file.completion,
            github: file.github,
            timings: file.pipeline,
            secrets,
            source,
        })
    }

    /// Load file + environment. A `.env` file in the working directory is
    /// honoured but never overrides variables already set.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let (file, source) = FileConfig::discover(config_path)?;
        Self::new(file, Secrets::from_env()?, source)
    }

    /// Apply CLI overrides on top of file and environment values.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// Human-readable summary without secrets.
    pub fn redacted_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "config file:      {}\n",
            self.source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<defaults>".to_string())
        ));
        out.push_str(&format!("listen:           {}\n", self.server.address()));
        out.push_str(&format!("github account:   {}\n", self.secrets.github_username));
        out.push_str(&format!("github api:       {}\n", self.github.api_base));
        out.push_str(&format!("completion api:   {}\n", self.completion.base_url));
        out.push_str(&format!(
            "models:           app={} readme={} format={}\n",
            self.completion.app_model, self.completion.readme_model, self.completion.format
        ));
        out.push_str(&format!(
            "pages polling:    {} x {}s\n",
            self.timings.pages_poll_attempts, self.timings.pages_poll_interval_secs
        ));
        out.push_str(&format!(
            "settle delay:     round1={}s round2={}s\n",
            self.timings.settle_round_one_secs, self.timings.settle_round_two_secs
        ));
        out
    }
}

#[cfg(test)]
pub(crate) fn test_secrets() -> Secrets {
    Secrets {
        shared_secret: "s3cret".to_string(),
        github_token: "ghp_test".to_string(),
        github_username: "octo".to_string(),
        completion_api_key: "key".to_string(),
    }
}
