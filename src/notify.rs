//! Delivery of deployment results to the evaluation endpoint.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Settings;
use crate::models::EvaluationPayload;
use crate::util::Sleeper;

pub struct Notifier {
    http: reqwest::Client,
    max_retries: u32,
    initial_backoff: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Notifier {
    pub fn new(
        timeout: Duration,
        max_retries: u32,
        initial_backoff: Duration,
        sleeper: Arc<dyn Sleeper>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            max_retries,
            initial_backoff,
            sleeper,
        })
    }

    pub fn from_settings(settings: &Settings, sleeper: Arc<dyn Sleeper>) -> anyhow::Result<Self> {
        Self::new(
            settings.timings.notify_timeout(),
            settings.timings.notify_max_retries,
            settings.timings.notify_initial_backoff(),
            sleeper,
        )
    }

    /// POST `payload` to `url`, retrying until a 200 arrives.
    ///
    /// The delay starts at the initial backoff and doubles after each failed
    /// attempt; there is no sleep after the last one. Returns whether the
    /// endpoint acknowledged the payload.
    pub async fn notify(&self, url: &str, payload: &EvaluationPayload) -> bool {
        let mut delay = self.initial_backoff;

        for attempt in 1..=self.max_retries {
            let result = self
                .http
                .post(url)
                .header("Content-Type", "application/json")
                .json(payload)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                    info!(url, attempt, "Evaluation endpoint acknowledged results");
                    return true;
                }
                Ok(resp) => warn!(
                    url,
                    attempt,
                    status = resp.status().as_u16(),
                    "Evaluation endpoint rejected results"
                ),
                Err(e) => warn!(url, attempt, "Evaluation request failed: {}", e),
            }

            if attempt < self.max_retries {
                self.sleeper.sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }

        warn!(url, attempts = self.max_retries, "Giving up on evaluation notification");
        false
    }
}
