//! Per-request background run.
//!
//! ```text
//! AppGenerator ─> ReadmeGenerator ─> Publisher (round 1: create, round 2: update)
//!     ─> settle delay ─> Notifier
//! ```
//!
//! Each accepted request gets its own detached task. Everything it raises is
//! logged at the task boundary and dropped; the webhook caller has already
//! been answered by then.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::{Settings, Timings};
use crate::errors::PipelineError;
use crate::generate::{AppGenerator, ReadmeGenerator};
use crate::github::{GitHubClient, HostingApi, HttpSiteProbe, Publisher, SiteProbe};
use crate::llm::{Completer, CompletionClient};
use crate::models::{DeploymentResult, EvaluationPayload, Round, TaskRequest};
use crate::notify::Notifier;
use crate::util::{Sleeper, TokioSleeper};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub deployment: DeploymentResult,
    /// Whether the evaluation endpoint acknowledged the result.
    pub notified: bool,
}

pub struct PipelineRunner {
    app: AppGenerator,
    readme: ReadmeGenerator,
    publisher: Publisher,
    notifier: Notifier,
    sleeper: Arc<dyn Sleeper>,
    timings: Timings,
}

impl PipelineRunner {
    pub fn new(
        app: AppGenerator,
        readme: ReadmeGenerator,
        publisher: Publisher,
        notifier: Notifier,
        sleeper: Arc<dyn Sleeper>,
        timings: Timings,
    ) -> Self {
        Self {
            app,
            readme,
            publisher,
            notifier,
            sleeper,
            timings,
        }
    }

    /// Wire the real completion, GitHub and HTTP clients from `settings`.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

        let completer: Arc<dyn Completer> =
            Arc::new(CompletionClient::from_settings(settings, sleeper.clone())?);
        let app = AppGenerator::new(completer.clone(), &settings.completion.app_model)
            .with_format(settings.completion.format);
        let readme = ReadmeGenerator::new(completer, &settings.completion.readme_model)
            .with_format(settings.completion.format);

        let hosting: Arc<dyn HostingApi> = Arc::new(GitHubClient::from_settings(settings)?);
        let probe: Arc<dyn SiteProbe> =
            Arc::new(HttpSiteProbe::new(settings.timings.pages_probe_timeout())?);
        let publisher = Publisher::new(hosting, probe, sleeper.clone(), settings.timings.clone());

        let notifier = Notifier::from_settings(settings, sleeper.clone())?;

        Ok(Self::new(
            app,
            readme,
            publisher,
            notifier,
            sleeper,
            settings.timings.clone(),
        ))
    }

    /// Run every step for one request, strictly in sequence.
    pub async fn run(&self, request: &TaskRequest) -> Result<RunOutcome, PipelineError> {
        info!("Generating app code");
        let app_html = self
            .app
            .generate(&request.brief, &request.attachments, &request.checks)
            .await?;

        info!("Generating README");
        let is_update = request.round == 2;
        let readme = self
            .readme
            .generate(&request.brief, &request.task, is_update)
            .await?;

        let round = Round::try_from(request.round)?;
        let (deployment, settle_secs) = match round {
            Round::Create => {
                info!("Creating new repository");
                let deployment = self
                    .publisher
                    .create_and_publish(&request.task, &app_html, &readme)
                    .await?;
                (deployment, self.timings.settle_round_one_secs)
            }
            Round::Update => {
                info!("Updating round 1 repository");
                let deployment = self
                    .publisher
                    .resolve_and_publish(&request.task, &app_html, &readme, &request.brief)
                    .await?;
                (deployment, self.timings.settle_round_two_secs)
            }
        };

        info!(
            repo = %deployment.repo_url,
            commit = %deployment.commit_sha,
            pages = %deployment.pages_url,
            pages_ready = deployment.pages_ready,
            "Published"
        );

        info!(seconds = settle_secs, "Waiting for Pages to settle");
        self.sleeper.sleep(Duration::from_secs(settle_secs)).await;

        let payload = EvaluationPayload::new(request, &deployment);
        let notified = self
            .notifier
            .notify(&request.evaluation_url, &payload)
            .await;
        if !notified {
            warn!(url = %request.evaluation_url, "Evaluation endpoint never acknowledged");
        }

        Ok(RunOutcome {
            deployment,
            notified,
        })
    }

    /// Start a detached run. Failures end as an error log line.
    pub fn spawn(self: &Arc<Self>, request: TaskRequest) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        let span = info_span!("pipeline", task = %request.task, round = request.round);
        tokio::spawn(
            async move {
                info!("Processing task");
                match runner.run(&request).await {
                    Ok(outcome) => info!(
                        repo = %outcome.deployment.repo_name,
                        notified = outcome.notified,
                        "Task complete"
                    ),
                    Err(e) => error!("Task failed: {}", e),
                }
            }
            .instrument(span),
        )
    }
}
