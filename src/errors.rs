//! Typed error hierarchy for the launchpad service.
//!
//! One enum per failure family:
//! - `ConfigError`: missing or malformed configuration, fatal at startup
//! - `CompletionError`: the text-completion provider could not answer
//! - `GitHubError`: a single hosting-provider call failed
//! - `PublishError`: a publish step failed and the run must stop
//! - `PipelineError`: anything that aborts a background run
//!
//! A page that never becomes reachable is not an error; it is reported as
//! `pages_ready = false` on the deployment result.

use thiserror::Error;

/// Errors raised while assembling `Settings`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Errors from the completion client.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build completion HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Completion provider unavailable after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Errors from a single call to the hosting provider.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Failed to build GitHub HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("GitHub request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub returned {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Repository name '{name}' is already taken")]
    NameTaken { name: String },

    #[error("Failed to decode GitHub response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// Errors that abort a create or update publish.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("No repository found matching pattern '{pattern}*'. Create a round 1 repository first.")]
    RoundOneNotFound { pattern: String },

    #[error("Failed to update {path}: {source}")]
    FileUpdate {
        path: String,
        #[source]
        source: GitHubError,
    },

    #[error("Repository {repo} has no commits")]
    NoCommits { repo: String },

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Errors that abort a background pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported round number: {0}")]
    UnsupportedRound(i64),

    #[error("Generation failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Publishing failed: {0}")]
    Publish(#[from] PublishError),
}
