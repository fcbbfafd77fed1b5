//! Static hosting (GitHub Pages) setup and readiness polling.
//!
//! Nothing here fails the pipeline: configuration problems are logged and
//! the deployment carries on with whatever state the provider ended up in.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::client::{HostingApi, PagesCreation};
use crate::models::PagesSource;
use crate::util::Sleeper;

/// Public URL of the site served for `repo`.
pub fn pages_url(owner: &str, repo: &str) -> String {
    format!("https://{}.github.io/{}/", owner, repo)
}

/// What a configuration check found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagesState {
    /// Already served from `main` at the root.
    OnMain,
    /// Pointed elsewhere and was switched to `main`.
    Switched,
    /// Pointed elsewhere and the provider refused the switch.
    SwitchRefused,
    /// Not configured at all.
    Missing,
    /// The configuration could not be read.
    Unknown,
}

/// Make sure an existing Pages configuration serves `main` at the root.
pub async fn ensure_pages_on_main(api: &dyn HostingApi, repo: &str) -> PagesState {
    let current = match api.get_pages(repo).await {
        Ok(Some(source)) => source,
        Ok(None) => {
            debug!(repo, "Pages not configured");
            return PagesState::Missing;
        }
        Err(e) => {
            warn!(repo, "Could not read Pages configuration: {}", e);
            return PagesState::Unknown;
        }
    };

    if current.branch == "main" {
        info!(repo, "Pages already serving from main");
        return PagesState::OnMain;
    }

    info!(repo, branch = %current.branch, "Switching Pages source to main");
    match api.update_pages(repo, &PagesSource::main_root()).await {
        Ok(true) => PagesState::Switched,
        Ok(false) => {
            warn!(repo, "Provider refused to switch Pages source to main");
            PagesState::SwitchRefused
        }
        Err(e) => {
            warn!(repo, "Failed to switch Pages source: {}", e);
            PagesState::SwitchRefused
        }
    }
}

/// Round 1: ensure Pages is on, creating it from `main` when absent.
pub async fn enable_pages(
    api: &dyn HostingApi,
    repo: &str,
    sleeper: &dyn Sleeper,
    propagation_delay: Duration,
) -> PagesState {
    let state = ensure_pages_on_main(api, repo).await;
    if !matches!(state, PagesState::Missing | PagesState::Unknown) {
        return state;
    }

    match api.create_pages(repo, &PagesSource::main_root()).await {
        Ok(PagesCreation::Created) => {
            info!(repo, "Pages enabled");
            sleeper.sleep(propagation_delay).await;
            ensure_pages_on_main(api, repo).await
        }
        Ok(PagesCreation::AlreadyExists) => {
            info!(repo, "Pages already exists, verifying source");
            ensure_pages_on_main(api, repo).await
        }
        Ok(PagesCreation::Rejected(status)) => {
            warn!(repo, status, "Pages creation rejected");
            state
        }
        Err(e) => {
            warn!(repo, "Pages creation failed: {}", e);
            state
        }
    }
}

/// Abstraction over fetching the published site for testability.
/// Real implementation: `HttpSiteProbe`.
#[async_trait]
pub trait SiteProbe: Send + Sync {
    /// HTTP status of `url` after following redirects.
    async fn status(&self, url: &str) -> anyhow::Result<u16>;
}

pub struct HttpSiteProbe {
    http: reqwest::Client,
}

impl HttpSiteProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl SiteProbe for HttpSiteProbe {
    async fn status(&self, url: &str) -> anyhow::Result<u16> {
        let resp = self.http.get(url).send().await?;
        Ok(resp.status().as_u16())
    }
}

/// Poll `url` until it answers 200, sleeping `interval` before each probe.
///
/// Returns `false` once `attempts` probes have gone by without a 200.
pub async fn wait_for_deployment(
    probe: &dyn SiteProbe,
    sleeper: &dyn Sleeper,
    url: &str,
    attempts: u32,
    interval: Duration,
) -> bool {
    info!(url, attempts, "Waiting for Pages deployment");
    for attempt in 1..=attempts {
        sleeper.sleep(interval).await;
        match probe.status(url).await {
            Ok(200) => {
                info!(url, attempt, "Pages site is live");
                return true;
            }
            Ok(status) => debug!(url, attempt, status, "Pages not ready yet"),
            Err(e) => debug!(url, attempt, "Pages probe failed: {}", e),
        }
    }
    warn!(url, attempts, "Pages deployment not confirmed, site may need more time");
    false
}
