//! Poll driver — authenticates, fetches quota and usage, publishes.
//!
//! Runs on startup and then every poll interval. A failed cycle (auth,
//! quota or usage) publishes nothing; the driver waits the retry interval
//! and starts over from authentication. By default it keeps trying
//! forever: stale metrics beat a dead exporter.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::QuotaApi;
use crate::auth::TokenProvider;
use crate::config::{ApiVersion, Config};
use crate::error::CycleError;
use crate::metrics::QuotaMetrics;
use crate::normalize;

/// Loop timing and retry policy.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub project_id: String,
    pub api_version: ApiVersion,
    pub interval: Duration,
    pub retry_wait: Duration,
    /// `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            project_id: config.project_id.clone(),
            api_version: config.api_version,
            interval: config.interval,
            retry_wait: config.retry_wait,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

pub struct PollDriver {
    auth: Arc<dyn TokenProvider>,
    api: Arc<dyn QuotaApi>,
    metrics: Arc<QuotaMetrics>,
    settings: PollSettings,
}

impl PollDriver {
    pub fn new(
        auth: Arc<dyn TokenProvider>,
        api: Arc<dyn QuotaApi>,
        metrics: Arc<QuotaMetrics>,
        settings: PollSettings,
    ) -> Self {
        Self {
            auth,
            api,
            metrics,
            settings,
        }
    }

    /// Poll until `shutdown` flips to true.
    ///
    /// Returns `Err` only when `max_consecutive_failures` is set and
    /// exhausted.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), CycleError> {
        info!(
            project = %self.settings.project_id,
            api_version = self.settings.api_version.as_str(),
            interval_secs = self.settings.interval.as_secs(),
            retry_wait_secs = self.settings.retry_wait.as_secs(),
            "📡 Quota poller starting"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            info!("Scrape Quota and Usage Metrics");

            // Dropping the cycle future can only happen at an await point,
            // and publish has none, so shutdown never splits a publish.
            let outcome = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                outcome = self.run_cycle() => outcome,
            };

            let wait = match outcome {
                Ok(series) => {
                    consecutive_failures = 0;
                    info!(series, "📡 Quota and usage published");
                    self.settings.interval
                }
                Err(e) => {
                    consecutive_failures += 1;
                    self.metrics.record_failure(e.stage());
                    error!(
                        stage = e.stage(),
                        consecutive_failures,
                        retry_in_secs = self.settings.retry_wait.as_secs(),
                        "{}",
                        e
                    );

                    if let Some(max) = self.settings.max_consecutive_failures {
                        if consecutive_failures >= max {
                            warn!(max, "Giving up after repeated poll failures");
                            return Err(e);
                        }
                    }
                    self.settings.retry_wait
                }
            };

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("📡 Quota poller stopped");
        Ok(())
    }

    /// One authenticate → fetch → normalize → publish pass.
    ///
    /// Returns the number of series published. On error nothing is
    /// published; a quota snapshot fetched before a usage failure is
    /// discarded.
    pub async fn run_cycle(&self) -> Result<usize, CycleError> {
        let project = self.settings.project_id.as_str();
        let token = self.auth.acquire_token().await.map_err(CycleError::Auth)?;

        let points = match self.settings.api_version {
            ApiVersion::V3 => {
                let quota = self
                    .api
                    .quota_v3(project, &token)
                    .await
                    .map_err(CycleError::Quota)?;
                let usage = self
                    .api
                    .current_usage_v3(project, &token)
                    .await
                    .map_err(CycleError::Usage)?;
                normalize::normalize_v3(&quota, &usage, project)
            }
            ApiVersion::V1 => {
                let quota = self
                    .api
                    .quota_v1(project, &token)
                    .await
                    .map_err(CycleError::Quota)?;
                let usage = self
                    .api
                    .current_usage_v1(project, &token)
                    .await
                    .map_err(CycleError::Usage)?;
                normalize::normalize_v1(&quota, &usage, project)
            }
        };

        Ok(self.metrics.publish(&points))
    }
}

/// Resolves once the flag is set. A dropped sender means nobody can ask
/// for shutdown any more, so this then never resolves.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
