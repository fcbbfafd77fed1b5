use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// A file referenced by the task brief, usually a `data:` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// One accepted unit of work. Owned by exactly one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub email: String,
    pub task: String,
    /// Kept as the raw integer so out-of-range rounds surface inside the run.
    pub round: i64,
    pub nonce: String,
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// Create a new repository and app.
    Create,
    /// Overwrite the app in the round 1 repository.
    Update,
}

impl Round {
    pub fn as_number(&self) -> i64 {
        match self {
            Self::Create => 1,
            Self::Update => 2,
        }
    }
}

impl TryFrom<i64> for Round {
    type Error = PipelineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Create),
            2 => Ok(Self::Update),
            other => Err(PipelineError::UnsupportedRound(other)),
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_number())
    }
}

/// A hosting repository (subset of fields we care about).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

/// Static-hosting source of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesSource {
    pub branch: String,
    #[serde(default = "default_pages_path")]
    pub path: String,
}

fn default_pages_path() -> String {
    "/".to_string()
}

impl PagesSource {
    pub fn main_root() -> Self {
        Self {
            branch: "main".to_string(),
            path: "/".to_string(),
        }
    }
}

/// Where the published app ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
    pub repo_name: String,
    pub pages_ready: bool,
}

/// Body POSTed to the evaluation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub email: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl EvaluationPayload {
    pub fn new(request: &TaskRequest, result: &DeploymentResult) -> Self {
        Self {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: result.repo_url.clone(),
            commit_sha: result.commit_sha.clone(),
            pages_url: result.pages_url.clone(),
        }
    }
}
