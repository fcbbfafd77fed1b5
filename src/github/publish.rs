use std::sync::Arc;

use tracing::{info, warn};

use super::client::HostingApi;
use super::lookup::find_round_one;
use super::naming::resolve_unique_name;
use super::pages::{self, SiteProbe};
use super::{INDEX_PATH, LICENSE_PATH, README_PATH, ROUND_ONE_SUFFIX};
use crate::config::Timings;
use crate::errors::{GitHubError, PublishError};
use crate::models::{DeploymentResult, Repository};
use crate::util::Sleeper;

/// Rounds of name resolution when a concurrent run grabs the name between
/// the availability check and the create call.
const MAX_CREATE_ATTEMPTS: u32 = 3;

pub const MIT_LICENSE: &str = r#"MIT License

Copyright (c) 2025

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE."#;

/// Publishes generated apps to the hosting provider and waits for them to
/// go live.
pub struct Publisher {
    hosting: Arc<dyn HostingApi>,
    probe: Arc<dyn SiteProbe>,
    sleeper: Arc<dyn Sleeper>,
    timings: Timings,
}

impl Publisher {
    pub fn new(
        hosting: Arc<dyn HostingApi>,
        probe: Arc<dyn SiteProbe>,
        sleeper: Arc<dyn Sleeper>,
        timings: Timings,
    ) -> Self {
        Self {
            hosting,
            probe,
            sleeper,
            timings,
        }
    }

    /// Round 1: new repository with LICENSE, README.md and index.html,
    /// Pages enabled from `main`.
    pub async fn create_and_publish(
        &self,
        task_id: &str,
        app_html: &str,
        readme: &str,
    ) -> Result<DeploymentResult, PublishError> {
        let repo = self.create_repository(task_id).await?;
        info!(repo = %repo.name, url = %repo.html_url, "Created repository");

        let files = [
            (LICENSE_PATH, "Add MIT License", MIT_LICENSE),
            (README_PATH, "Add README", readme),
            (INDEX_PATH, "Add main application", app_html),
        ];
        for (path, message, content) in files {
            self.hosting
                .put_file(&repo.name, path, message, content, None)
                .await?;
            info!(repo = %repo.name, path, "Committed file");
        }

        self.sleeper.sleep(self.timings.propagation_delay()).await;
        let state = pages::enable_pages(
            self.hosting.as_ref(),
            &repo.name,
            self.sleeper.as_ref(),
            self.timings.propagation_delay(),
        )
        .await;
        info!(repo = %repo.name, ?state, "Pages configuration settled");

        self.finish(&repo).await
    }

    /// Round 2: overwrite index.html and README.md in the most recent
    /// round 1 repository for `task_id`.
    pub async fn resolve_and_publish(
        &self,
        task_id: &str,
        app_html: &str,
        readme: &str,
        brief: &str,
    ) -> Result<DeploymentResult, PublishError> {
        let repo = find_round_one(self.hosting.as_ref(), task_id).await?;

        self.overwrite(
            &repo.name,
            INDEX_PATH,
            &format!("Round 2 update: {}", brief),
            app_html,
        )
        .await?;
        self.overwrite(
            &repo.name,
            README_PATH,
            "Round 2 update: Updated README",
            readme,
        )
        .await?;

        let state = pages::ensure_pages_on_main(self.hosting.as_ref(), &repo.name).await;
        info!(repo = %repo.name, ?state, "Pages configuration verified");
        self.sleeper.sleep(self.timings.propagation_delay()).await;

        self.finish(&repo).await
    }

    async fn create_repository(&self, task_id: &str) -> Result<Repository, PublishError> {
        let description = format!("Auto-generated app for {}", task_id);
        let mut attempt = 1;
        loop {
            let name = resolve_unique_name(
                self.hosting.as_ref(),
                task_id,
                ROUND_ONE_SUFFIX,
                self.timings.naming_max_attempts,
            )
            .await;

            match self.hosting.create_repo(&name, &description).await {
                Ok(repo) => return Ok(repo),
                Err(GitHubError::NameTaken { name }) if attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(%name, attempt, "Name taken during create, resolving again");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn overwrite(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
    ) -> Result<(), PublishError> {
        let wrap = |source: GitHubError| PublishError::FileUpdate {
            path: path.to_string(),
            source,
        };
        let current = self.hosting.get_file(repo, path).await.map_err(wrap)?;
        self.hosting
            .put_file(repo, path, message, content, Some(&current.sha))
            .await
            .map_err(wrap)?;
        info!(repo, path, "Updated file");
        Ok(())
    }

    async fn finish(&self, repo: &Repository) -> Result<DeploymentResult, PublishError> {
        let commit_sha = self
            .hosting
            .list_commits(&repo.name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::NoCommits {
                repo: repo.name.clone(),
            })?;

        let pages_url = pages::pages_url(self.hosting.owner(), &repo.name);
        let pages_ready = pages::wait_for_deployment(
            self.probe.as_ref(),
            self.sleeper.as_ref(),
            &pages_url,
            self.timings.pages_poll_attempts,
            self.timings.pages_poll_interval(),
        )
        .await;

        Ok(DeploymentResult {
            repo_url: repo.html_url.clone(),
            commit_sha,
            pages_url,
            repo_name: repo.name.clone(),
            pages_ready,
        })
    }
}
