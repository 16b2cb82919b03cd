//! Pull-based federation sync for child sites.
//!
//! A child site periodically pulls a [`SyncPackage`] from its upstream,
//! applies the catalogs to its local registry, dispatches the jobs on the
//! `remote` topic, and posts activation status reports back. Delivery is
//! at-least-once: the upstream forgets a batch at drain time, so local
//! application must be idempotent (which catalog upserts are).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use meridian_core::bus::{topics, Event, EventBus};
use meridian_core::model::{ActivationPhase, ActivationStatus, SyncPackage};

use crate::config::UpstreamConfig;
use crate::error::{ControlError, ControlResult};
use crate::managers::CatalogsManager;

/// Backoff base after the first failed pull.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Backoff ceiling.
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// HTTP client for the upstream federation endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    /// Create a client from configuration.
    pub fn new(config: &UpstreamConfig) -> ControlResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ControlError::Http)?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    /// Create a client with a custom base URL and default timeout.
    pub fn with_url(url: impl Into<String>) -> ControlResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ControlError::Http)?;
        Ok(Self {
            client,
            base_url: url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Pull one batch of staged work for a site.
    pub async fn pull(&self, site: &str) -> ControlResult<SyncPackage> {
        let url = format!("{}/federation/sync", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("site", site)])
            .send()
            .await
            .map_err(ControlError::Http)?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(ControlError::Http),
            StatusCode::NOT_FOUND => Err(ControlError::not_found(format!(
                "site {site} is not registered upstream"
            ))),
            status => Err(ControlError::internal(format!(
                "sync pull failed: {status}"
            ))),
        }
    }

    /// Post an activation status report to the upstream.
    pub async fn report(&self, status: &ActivationStatus) -> ControlResult<()> {
        let url = format!("{}/federation/sync", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(status)
            .send()
            .await
            .map_err(ControlError::Http)?;

        if !response.status().is_success() {
            return Err(ControlError::internal(format!(
                "status report rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Periodic upstream puller for one site.
pub struct SyncManager {
    client: UpstreamClient,
    catalogs: Arc<CatalogsManager>,
    bus: Arc<EventBus>,
    site_id: String,
    interval: Duration,
}

impl SyncManager {
    /// Create a sync manager pulling on behalf of `site_id`.
    #[must_use]
    pub fn new(
        client: UpstreamClient,
        catalogs: Arc<CatalogsManager>,
        bus: Arc<EventBus>,
        site_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            catalogs,
            bus,
            site_id: site_id.into(),
            interval,
        }
    }

    /// Run the pull loop until cancelled.
    ///
    /// Network failures back off exponentially (1s base, 60s cap, ±20%
    /// jitter); a successful pull resets the cadence to the configured
    /// interval.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(site = %self.site_id, interval = ?self.interval, "sync loop started");
        let mut failures: u32 = 0;

        loop {
            let delay = if failures == 0 {
                self.interval
            } else {
                backoff_delay(failures)
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            match self.sync_once().await {
                Ok(applied) => {
                    failures = 0;
                    if applied > 0 {
                        info!(site = %self.site_id, applied, "sync pull applied");
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(site = %self.site_id, failures, error = %e, "sync pull failed");
                }
            }
        }
        info!(site = %self.site_id, "sync loop stopped");
    }

    /// Pull one package and apply it locally.
    pub async fn sync_once(&self) -> ControlResult<usize> {
        let package = self.client.pull(&self.site_id).await?;
        if package.is_empty() {
            debug!(site = %self.site_id, "sync pull empty");
            return Ok(0);
        }
        self.apply_package(package).await
    }

    /// Apply a pulled package: upsert catalogs, dispatch jobs on `remote`.
    ///
    /// A catalog that fails to apply is logged and reported as failed but
    /// not retried here; the upstream re-enqueues on its next change.
    pub async fn apply_package(&self, package: SyncPackage) -> ControlResult<usize> {
        let origin = package.origin.clone();
        let mut applied = 0;

        for catalog in package.catalogs {
            let name = catalog.name.clone();
            match self.catalogs.upsert_spec(&name, catalog).await {
                Ok(()) => {
                    applied += 1;
                    self.report_applied(&name, ActivationPhase::Succeeded, None)
                        .await;
                }
                Err(e) => {
                    error!(catalog = %name, error = %e, "failed to apply synced catalog");
                    self.report_applied(&name, ActivationPhase::Failed, Some(e.to_string()))
                        .await;
                }
            }
        }

        for job in package.jobs {
            match Event::from_body(&job) {
                Ok(event) => {
                    let event = event.with_metadata("site", origin.clone());
                    self.bus.publish(topics::REMOTE, event).await;
                    applied += 1;
                }
                Err(e) => error!(job = %job.id, error = %e, "failed to encode synced job"),
            }
        }
        Ok(applied)
    }

    async fn report_applied(&self, name: &str, phase: ActivationPhase, error: Option<String>) {
        let status = ActivationStatus {
            instance_id: name.to_owned(),
            status: phase,
            stage: "sync".to_owned(),
            error,
            updated_at: Some(chrono::Utc::now()),
            ..ActivationStatus::default()
        };
        if let Err(e) = self.client.report(&status).await {
            warn!(catalog = %name, error = %e, "failed to report sync status upstream");
        }
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("site_id", &self.site_id)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Exponential backoff with ±20% jitter: 1s, 2s, 4s, ... capped at 60s.
fn backoff_delay(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(6);
    let base = BACKOFF_BASE * 2u32.pow(exp);
    let base = base.min(BACKOFF_CAP);
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    base.mul_f64(jitter).min(BACKOFF_CAP.mul_f64(1.2))
}
