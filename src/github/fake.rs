//! In-memory `HostingApi` used by unit tests across the crate.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::client::{FileContent, HostingApi, PagesCreation};
use crate::errors::GitHubError;
use crate::models::{PagesSource, Repository};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Commit {
    pub sha: String,
    pub path: String,
    pub message: String,
}

#[derive(Default)]
struct State {
    repos: Vec<Repository>,
    files: HashMap<(String, String), FileContent>,
    commits: HashMap<String, Vec<Commit>>,
    pages: HashMap<String, PagesSource>,
    repo_lookups: Vec<String>,
    failing_lookups: HashSet<String>,
    fail_listing: bool,
    pages_creation: Option<PagesCreation>,
    pages_update_ok: bool,
    pages_updates: Vec<String>,
    pages_creations: Vec<String>,
    next_id: u64,
    next_sha: u64,
}

pub(crate) struct FakeHosting {
    state: Mutex<State>,
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn not_found(endpoint: String) -> GitHubError {
    GitHubError::Status {
        endpoint,
        status: 404,
        body: "Not Found".to_string(),
    }
}

impl FakeHosting {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pages_update_ok: true,
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Add an existing repository created `age_secs` after the fake epoch.
    pub(crate) fn seed_repo(&self, name: &str, age_secs: i64) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.repos.push(Repository {
            id,
            name: name.to_string(),
            html_url: format!("https://github.com/octo/{}", name),
            created_at: epoch() + Duration::seconds(age_secs),
        });
    }

    pub(crate) fn seed_file(&self, repo: &str, path: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        let sha = Self::next_sha(&mut state);
        state.files.insert(
            (repo.to_string(), path.to_string()),
            FileContent {
                sha,
                content: content.to_string(),
            },
        );
    }

    pub(crate) fn seed_pages(&self, repo: &str, branch: &str) {
        self.state.lock().unwrap().pages.insert(
            repo.to_string(),
            PagesSource {
                branch: branch.to_string(),
                path: "/".to_string(),
            },
        );
    }

    pub(crate) fn fail_lookup(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(name.to_string());
    }

    pub(crate) fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    /// Force every `create_pages` call to answer `outcome` without storing anything.
    pub(crate) fn force_pages_creation(&self, outcome: PagesCreation) {
        self.state.lock().unwrap().pages_creation = Some(outcome);
    }

    pub(crate) fn refuse_pages_updates(&self) {
        self.state.lock().unwrap().pages_update_ok = false;
    }

    pub(crate) fn repo_lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().repo_lookups.clone()
    }

    pub(crate) fn repo_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.repos.iter().map(|r| r.name.clone()).collect()
    }

    pub(crate) fn file(&self, repo: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&(repo.to_string(), path.to_string()))
            .map(|f| f.content.clone())
    }

    /// Commits oldest first.
    pub(crate) fn commits(&self, repo: &str) -> Vec<Commit> {
        let state = self.state.lock().unwrap();
        state.commits.get(repo).cloned().unwrap_or_default()
    }

    pub(crate) fn pages(&self, repo: &str) -> Option<PagesSource> {
        self.state.lock().unwrap().pages.get(repo).cloned()
    }

    pub(crate) fn pages_creations(&self) -> Vec<String> {
        self.state.lock().unwrap().pages_creations.clone()
    }

    pub(crate) fn pages_updates(&self) -> Vec<String> {
        self.state.lock().unwrap().pages_updates.clone()
    }

    fn next_sha(state: &mut State) -> String {
        state.next_sha += 1;
        format!("sha{:04}", state.next_sha)
    }
}

#[async_trait]
impl HostingApi for FakeHosting {
    fn owner(&self) -> &str {
        "octo"
    }

    async fn get_repo(&self, name: &str) -> Result<Option<Repository>, GitHubError> {
        // Let concurrent runs interleave between the check and the create.
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.repo_lookups.push(name.to_string());
        if state.failing_lookups.contains(name) {
            return Err(GitHubError::Status {
                endpoint: format!("/repos/octo/{}", name),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(state.repos.iter().find(|r| r.name == name).cloned())
    }

    async fn create_repo(&self, name: &str, _description: &str) -> Result<Repository, GitHubError> {
        let mut state = self.state.lock().unwrap();
        if state.repos.iter().any(|r| r.name == name) {
            return Err(GitHubError::NameTaken {
                name: name.to_string(),
            });
        }
        let id = state.next_id;
        state.next_id += 1;
        let repo = Repository {
            id,
            name: name.to_string(),
            html_url: format!("https://github.com/octo/{}", name),
            created_at: epoch() + Duration::days(1) + Duration::seconds(id as i64),
        };
        state.repos.push(repo.clone());
        Ok(repo)
    }

    async fn list_repos(&self) -> Result<Vec<Repository>, GitHubError> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(GitHubError::Status {
                endpoint: "/user/repos".to_string(),
                status: 401,
                body: "Bad credentials".to_string(),
            });
        }
        Ok(state.repos.clone())
    }

    async fn get_file(&self, repo: &str, path: &str) -> Result<FileContent, GitHubError> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&(repo.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("/repos/octo/{}/contents/{}", repo, path)))
    }

    async fn put_file(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        if !state.repos.iter().any(|r| r.name == repo) {
            return Err(not_found(format!("/repos/octo/{}/contents/{}", repo, path)));
        }
        let key = (repo.to_string(), path.to_string());
        let current = state.files.get(&key).map(|f| f.sha.clone());
        if current.as_deref() != sha {
            return Err(GitHubError::Status {
                endpoint: format!("/repos/octo/{}/contents/{}", repo, path),
                status: 409,
                body: "sha mismatch".to_string(),
            });
        }
        let new_sha = Self::next_sha(&mut state);
        state.files.insert(
            key,
            FileContent {
                sha: new_sha.clone(),
                content: content.to_string(),
            },
        );
        state.commits.entry(repo.to_string()).or_default().push(Commit {
            sha: new_sha,
            path: path.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn list_commits(&self, repo: &str) -> Result<Vec<String>, GitHubError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .commits
            .get(repo)
            .map(|c| c.iter().rev().map(|c| c.sha.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_pages(&self, repo: &str) -> Result<Option<PagesSource>, GitHubError> {
        Ok(self.state.lock().unwrap().pages.get(repo).cloned())
    }

    async fn create_pages(&self, repo: &str, source: &PagesSource) -> Result<PagesCreation, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.pages_creations.push(repo.to_string());
        if let Some(outcome) = state.pages_creation {
            return Ok(outcome);
        }
        if state.pages.contains_key(repo) {
            return Ok(PagesCreation::AlreadyExists);
        }
        state.pages.insert(repo.to_string(), source.clone());
        Ok(PagesCreation::Created)
    }

    async fn update_pages(&self, repo: &str, source: &PagesSource) -> Result<bool, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.pages_updates.push(repo.to_string());
        if !state.pages_update_ok {
            return Ok(false);
        }
        state.pages.insert(repo.to_string(), source.clone());
        Ok(true)
    }
}
