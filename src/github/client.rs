use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::Settings;
use crate::errors::GitHubError;
use crate::models::{PagesSource, Repository};

const USER_AGENT: &str = "launchpad";
const API_VERSION: &str = "2022-11-28";
const REPOS_PER_PAGE: usize = 100;

/// Current content of a file in a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    /// Version token required to overwrite the file.
    pub sha: String,
    pub content: String,
}

/// Outcome of asking the provider to enable static hosting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagesCreation {
    Created,
    AlreadyExists,
    Rejected(u16),
}

/// Abstraction over the code-hosting provider for testability.
/// Real implementation: `GitHubClient`.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Account that owns the repositories.
    fn owner(&self) -> &str;

    /// `Ok(None)` only when the provider answers "not found".
    async fn get_repo(&self, name: &str) -> Result<Option<Repository>, GitHubError>;

    /// Create a public repository without an initial commit.
    async fn create_repo(&self, name: &str, description: &str) -> Result<Repository, GitHubError>;

    async fn list_repos(&self) -> Result<Vec<Repository>, GitHubError>;

    async fn get_file(&self, repo: &str, path: &str) -> Result<FileContent, GitHubError>;

    /// Create a file, or overwrite it when `sha` is the current version token.
    async fn put_file(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> Result<(), GitHubError>;

    /// Commit SHAs, newest first.
    async fn list_commits(&self, repo: &str) -> Result<Vec<String>, GitHubError>;

    async fn get_pages(&self, repo: &str) -> Result<Option<PagesSource>, GitHubError>;

    async fn create_pages(&self, repo: &str, source: &PagesSource) -> Result<PagesCreation, GitHubError>;

    /// Returns `false` when the provider refused the change.
    async fn update_pages(&self, repo: &str, source: &PagesSource) -> Result<bool, GitHubError>;
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    source: Option<PagesSource>,
}

/// REST client for the GitHub API.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    owner: String,
}

impl GitHubClient {
    pub fn new(
        api_base: &str,
        token: &str,
        owner: &str,
        timeout: Duration,
    ) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GitHubError::Client)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            owner: owner.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, GitHubError> {
        Self::new(
            &settings.github.api_base,
            &settings.secrets.github_token,
            &settings.secrets.github_username,
            settings.timings.github_timeout(),
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    fn repo_path(&self, repo: &str) -> String {
        format!("/repos/{}/{}", self.owner, repo)
    }

    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response, GitHubError> {
        debug!(endpoint, "GitHub request");
        builder.send().await.map_err(|source| GitHubError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, GitHubError> {
        resp.json::<T>().await.map_err(|e| GitHubError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn status_error(endpoint: &str, resp: Response) -> GitHubError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        GitHubError::Status {
            endpoint: endpoint.to_string(),
            status,
            body,
        }
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn get_repo(&self, name: &str) -> Result<Option<Repository>, GitHubError> {
        let endpoint = self.repo_path(name);
        let resp = self
            .send(&endpoint, self.request(Method::GET, &endpoint))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(Self::decode(&endpoint, resp).await?)),
            _ => Err(Self::status_error(&endpoint, resp).await),
        }
    }

    async fn create_repo(&self, name: &str, description: &str) -> Result<Repository, GitHubError> {
        let endpoint = "/user/repos";
        let resp = self
            .send(
                endpoint,
                self.request(Method::POST, endpoint).json(&json!({
                    "name": name,
                    "description": description,
                    "private": false,
                    "auto_init": false,
                })),
            )
            .await?;
        match resp.status() {
            s if s.is_success() => Self::decode(endpoint, resp).await,
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = resp.text().await.unwrap_or_default();
                if body.contains("already exists") {
                    Err(GitHubError::NameTaken {
                        name: name.to_string(),
                    })
                } else {
                    Err(GitHubError::Status {
                        endpoint: endpoint.to_string(),
                        status: 422,
                        body,
                    })
                }
            }
            _ => Err(Self::status_error(endpoint, resp).await),
        }
    }

    async fn list_repos(&self) -> Result<Vec<Repository>, GitHubError> {
        let endpoint = "/user/repos";
        let mut all_repos = Vec::new();
        let mut page = 1u32;

        loop {
            let resp = self
                .send(
                    endpoint,
                    self.request(Method::GET, endpoint).query(&[
                        ("type", "owner".to_string()),
                        ("per_page", REPOS_PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ]),
                )
                .await?;
            if !resp.status().is_success() {
                return Err(Self::status_error(endpoint, resp).await);
            }
            let repos: Vec<Repository> = Self::decode(endpoint, resp).await?;
            let count = repos.len();
            all_repos.extend(repos);

            if count < REPOS_PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(all_repos)
    }

    async fn get_file(&self, repo: &str, path: &str) -> Result<FileContent, GitHubError> {
        let endpoint = format!("{}/contents/{}", self.repo_path(repo), path);
        let resp = self
            .send(&endpoint, self.request(Method::GET, &endpoint))
            .await?;
        if !resp.status().is_success() {
            return Err(Self::status_error(&endpoint, resp).await);
        }
        let body: ContentsResponse = Self::decode(&endpoint, resp).await?;
        // The API wraps base64 at 60 columns.
        let packed: String = body.content.split_whitespace().collect();
        let bytes = BASE64.decode(packed).map_err(|e| GitHubError::Decode {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;
        Ok(FileContent {
            sha: body.sha,
            content: String::from_utf8_lossy(&bytes).to_string(),
        })
    }

    async fn put_file(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> Result<(), GitHubError> {
        let endpoint = format!("{}/contents/{}", self.repo_path(repo), path);
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let resp = self
            .send(&endpoint, self.request(Method::PUT, &endpoint).json(&body))
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(&endpoint, resp).await)
        }
    }

    async fn list_commits(&self, repo: &str) -> Result<Vec<String>, GitHubError> {
        let endpoint = format!("{}/commits", self.repo_path(repo));
        let resp = self
            .send(
                &endpoint,
                self.request(Method::GET, &endpoint)
                    .query(&[("per_page", "10")]),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(Self::status_error(&endpoint, resp).await);
        }
        let commits: Vec<CommitResponse> = Self::decode(&endpoint, resp).await?;
        Ok(commits.into_iter().map(|c| c.sha).collect())
    }

    async fn get_pages(&self, repo: &str) -> Result<Option<PagesSource>, GitHubError> {
        let endpoint = format!("{}/pages", self.repo_path(repo));
        let resp = self
            .send(&endpoint, self.request(Method::GET, &endpoint))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let body: PagesResponse = Self::decode(&endpoint, resp).await?;
                Ok(Some(body.source.unwrap_or_else(|| PagesSource {
                    branch: String::new(),
                    path: "/".to_string(),
                })))
            }
            _ => Err(Self::status_error(&endpoint, resp).await),
        }
    }

    async fn create_pages(&self, repo: &str, source: &PagesSource) -> Result<PagesCreation, GitHubError> {
        let endpoint = format!("{}/pages", self.repo_path(repo));
        let resp = self
            .send(
                &endpoint,
                self.request(Method::POST, &endpoint)
                    .json(&json!({ "source": source })),
            )
            .await?;
        Ok(match resp.status() {
            StatusCode::CREATED => PagesCreation::Created,
            StatusCode::CONFLICT => PagesCreation::AlreadyExists,
            other => {
                let body = resp.text().await.unwrap_or_default();
                debug!(endpoint = %endpoint, status = other.as_u16(), %body, "Pages creation rejected");
                PagesCreation::Rejected(other.as_u16())
            }
        })
    }

    async fn update_pages(&self, repo: &str, source: &PagesSource) -> Result<bool, GitHubError> {
        let endpoint = format!("{}/pages", self.repo_path(repo));
        let resp = self
            .send(
                &endpoint,
                self.request(Method::PUT, &endpoint)
                    .json(&json!({ "source": source })),
            )
            .await?;
        Ok(matches!(resp.status(), StatusCode::OK | StatusCode::NO_CONTENT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post, put},
    };
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn test_client(base: &str) -> GitHubClient {
        GitHubClient::new(base, "ghp_x", "octo", Duration::from_secs(5)).unwrap()
    }

    fn repo_json(id: u64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "html_url": format!("https://github.com/octo/{}", name),
            "created_at": "2024-01-01T00:00:00Z",
        })
    }

    #[tokio::test]
    async fn test_get_repo_not_found_is_none() {
        let app = Router::new().route(
            "/repos/octo/{name}",
            get(|Path(name): Path<String>| async move {
                if name == "exists" {
                    (AxumStatus::OK, Json(repo_json(1, "exists")))
                } else {
                    (AxumStatus::NOT_FOUND, Json(json!({"message": "Not Found"})))
                }
            }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        assert!(client.get_repo("missing").await.unwrap().is_none());
        let found = client.get_repo("exists").await.unwrap().unwrap();
        assert_eq!(found.name, "exists");
    }

    #[tokio::test]
    async fn test_get_repo_server_error_is_error() {
        let app = Router::new().route(
            "/repos/octo/{name}",
            get(|| async { (AxumStatus::BAD_GATEWAY, "upstream") }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        let err = client.get_repo("x").await.unwrap_err();
        assert!(matches!(err, GitHubError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_hung_request_times_out() {
        let app = Router::new().route(
            "/repos/octo/{name}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Json(repo_json(1, "never"))
            }),
        );
        let base = spawn_server(app).await;
        let client = GitHubClient::new(&base, "ghp_x", "octo", Duration::from_millis(200)).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), client.get_repo("x"))
            .await
            .expect("request should be bounded by the client timeout");
        match result {
            Err(GitHubError::Transport { source, .. }) => assert!(source.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other.map(|r| r.is_some())),
        }
    }

    #[tokio::test]
    async fn test_create_repo_sends_public_no_init_and_auth() {
        let captured: Arc<Mutex<Option<(Value, String)>>> = Arc::new(Mutex::new(None));
        let slot = captured.clone();
        let app = Router::new().route(
            "/user/repos",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let slot = slot.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let name = body["name"].as_str().unwrap_or_default().to_string();
                    *slot.lock().unwrap() = Some((body, auth));
                    (AxumStatus::CREATED, Json(repo_json(9, &name)))
                }
            }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        let repo = client
            .create_repo("task-round1", "Auto-generated app for task")
            .await
            .unwrap();

        assert_eq!(repo.name, "task-round1");
        let (body, auth) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(body["private"], false);
        assert_eq!(body["auto_init"], false);
        assert_eq!(body["description"], "Auto-generated app for task");
        assert_eq!(auth, "Bearer ghp_x");
    }

    #[tokio::test]
    async fn test_create_repo_name_taken() {
        let app = Router::new().route(
            "/user/repos",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({"message": "Repository creation failed.",
                        "errors": [{"message": "name already exists on this account"}]})),
                )
            }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        let err = client.create_repo("dup", "d").await.unwrap_err();
        assert!(matches!(err, GitHubError::NameTaken { ref name } if name == "dup"));
    }

    #[tokio::test]
    async fn test_list_repos_paginates() {
        let app = Router::new().route(
            "/user/repos",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let page: u64 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let repos: Vec<Value> = if page == 1 {
                    (0..100).map(|i| repo_json(i, &format!("r{}", i))).collect()
                } else {
                    vec![repo_json(100, "last")]
                };
                Json(repos)
            }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        let repos = client.list_repos().await.unwrap();
        assert_eq!(repos.len(), 101);
        assert_eq!(repos[100].name, "last");
    }

    #[tokio::test]
    async fn test_get_file_decodes_wrapped_base64() {
        let app = Router::new().route(
            "/repos/octo/app/contents/{path}",
            get(|| async {
                // "hello world" wrapped across lines
                Json(json!({"sha": "abc", "content": "aGVsbG8g\nd29ybGQ=\n"}))
            }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        let file = client.get_file("app", "README.md").await.unwrap();
        assert_eq!(file.sha, "abc");
        assert_eq!(file.content, "hello world");
    }

    #[tokio::test]
    async fn test_put_file_encodes_content_and_sha() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let slot = captured.clone();
        let app = Router::new().route(
            "/repos/octo/app/contents/{path}",
            put(move |Json(body): Json<Value>| {
                let slot = slot.clone();
                async move {
                    *slot.lock().unwrap() = Some(body);
                    (AxumStatus::OK, Json(json!({})))
                }
            }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        client
            .put_file("app", "index.html", "Round 2 update: x", "hi", Some("old-sha"))
            .await
            .unwrap();

        let body = captured.lock().unwrap().clone().unwrap();
        assert_eq!(body["content"], "aGk=");
        assert_eq!(body["sha"], "old-sha");
        assert_eq!(body["message"], "Round 2 update: x");
    }

    #[tokio::test]
    async fn test_put_file_conflict_is_error() {
        let app = Router::new().route(
            "/repos/octo/app/contents/{path}",
            put(|| async { (AxumStatus::CONFLICT, "sha does not match") }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        let err = client
            .put_file("app", "index.html", "m", "c", Some("stale"))
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubError::Status { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_list_commits_newest_first() {
        let app = Router::new().route(
            "/repos/octo/app/commits",
            get(|| async { Json(json!([{"sha": "new"}, {"sha": "old"}])) }),
        );
        let base = spawn_server(app).await;
        let client = test_client(&base);

        assert_eq!(client.list_commits("app").await.unwrap(), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_pages_lifecycle_status_mapping() {
        let app = Router::new()
            .route(
                "/repos/octo/fresh/pages",
                get(|| async { (AxumStatus::NOT_FOUND, Json(json!({}))) })
                    .post(|| async { (AxumStatus::CREATED, Json(json!({}))) }),
            )
            .route(
                "/repos/octo/live/pages",
                get(|| async {
                    Json(json!({"source": {"branch": "gh-pages", "path": "/docs"}}))
                })
                .post(|| async { (AxumStatus::CONFLICT, Json(json!({}))) })
                .put(|| async { AxumStatus::NO_CONTENT }),
            )
            .route(
                "/repos/octo/locked/pages",
                post(|| async { (AxumStatus::FORBIDDEN, "nope") })
                    .put(|| async { AxumStatus::FORBIDDEN }),
            );
        let base = spawn_server(app).await;
        let client = test_client(&base);
        let main = PagesSource::main_root();

        assert!(client.get_pages("fresh").await.unwrap().is_none());
        assert_eq!(
            client.create_pages("fresh", &main).await.unwrap(),
            PagesCreation::Created
        );

        let live = client.get_pages("live").await.unwrap().unwrap();
        assert_eq!(live.branch, "gh-pages");
        assert_eq!(live.path, "/docs");
        assert_eq!(
            client.create_pages("live", &main).await.unwrap(),
            PagesCreation::AlreadyExists
        );
        assert!(client.update_pages("live", &main).await.unwrap());

        assert_eq!(
            client.create_pages("locked", &main).await.unwrap(),
            PagesCreation::Rejected(403)
        );
        assert!(!client.update_pages("locked", &main).await.unwrap());
    }
}
