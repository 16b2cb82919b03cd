//! Service lifecycle and federation wiring.
//!
//! [`FederationRuntime`] assembles the store, managers, bus, staging queue,
//! and reconciler, and wires the federation subscriptions:
//!
//! - `catalog` events fan out one staged job per registered site;
//! - `remote` events stage work for the site named in their metadata;
//! - `report` events forward activation statuses to the upstream;
//! - `job` events dispatch reconciliations.
//!
//! [`FederationService`] runs the HTTP server (and, on child sites, the
//! sync pull loop) over one runtime with graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use meridian_core::bus::{topics, Event, EventBus};
use meridian_core::model::{ActivationStatus, CatalogSpec, JobAction, JobData, JobObjectType, SiteSpec};
use meridian_state::MemoryStateStore;

use crate::api;
use crate::config::ControlConfig;
use crate::error::{ControlError, ControlResult};
use crate::managers::{
    ActivationsManager, CatalogsManager, DevicesManager, InstancesManager, ModelsManager,
    SitesManager, SolutionsManager, TargetsManager,
};
use crate::reconcile::{create_provider, Reconciler};
use crate::staging::StagingManager;
use crate::sync::{SyncManager, UpstreamClient};

/// Fully wired control-plane components for one site.
pub struct FederationRuntime {
    /// Process-wide event bus.
    pub bus: Arc<EventBus>,
    /// Sites registry.
    pub sites: Arc<SitesManager>,
    /// Catalogs registry.
    pub catalogs: Arc<CatalogsManager>,
    /// Devices registry.
    pub devices: Arc<DevicesManager>,
    /// AI models registry.
    pub models: Arc<ModelsManager>,
    /// Solutions registry.
    pub solutions: Arc<SolutionsManager>,
    /// Instances registry.
    pub instances: Arc<InstancesManager>,
    /// Targets registry.
    pub targets: Arc<TargetsManager>,
    /// Activations registry.
    pub activations: Arc<ActivationsManager>,
    /// Per-site staging queues.
    pub staging: Arc<StagingManager>,
    /// Reconciliation engine.
    pub reconciler: Arc<Reconciler>,
    /// Sync puller, present when an upstream is configured.
    pub sync: Option<Arc<SyncManager>>,
    /// This site's name.
    pub site_id: String,
}

impl FederationRuntime {
    /// Build and wire a runtime from configuration.
    ///
    /// Fails with `MissingConfig` when a required piece (site identity,
    /// provider endpoint) is absent; the service never starts half-wired.
    pub async fn build(config: &ControlConfig, cancel: CancellationToken) -> ControlResult<Self> {
        if config.site.name.is_empty() {
            return Err(ControlError::missing_config("site.name is not supplied"));
        }

        let store: Arc<MemoryStateStore> = Arc::new(MemoryStateStore::new());
        let bus = Arc::new(EventBus::new());

        let sites = Arc::new(SitesManager::new(store.clone()));
        let catalogs = Arc::new(CatalogsManager::new(store.clone(), bus.clone()));
        let devices = Arc::new(DevicesManager::new(store.clone()));
        let models = Arc::new(ModelsManager::new(store.clone()));
        let solutions = Arc::new(SolutionsManager::new(store.clone()));
        let instances = Arc::new(InstancesManager::new(store.clone()));
        let targets = Arc::new(TargetsManager::new(store.clone()));
        let activations = Arc::new(ActivationsManager::new(store));

        let staging = Arc::new(StagingManager::new(sites.clone(), config.staging.batch_size));

        let provider = create_provider(&config.provider)?;
        let reconciler = Arc::new(Reconciler::new(
            provider,
            activations.clone(),
            instances.clone(),
            solutions.clone(),
            targets.clone(),
            bus.clone(),
            config.reconciler.clone(),
        ));

        let upstream = config
            .upstream
            .as_ref()
            .map(UpstreamClient::new)
            .transpose()?;
        let sync = upstream.as_ref().map(|client| {
            Arc::new(SyncManager::new(
                client.clone(),
                catalogs.clone(),
                bus.clone(),
                config.site.name.clone(),
                Duration::from_secs(
                    config
                        .upstream
                        .as_ref()
                        .map_or(15, |u| u.sync_interval_secs),
                ),
            ))
        });

        // The current process is always present in its own registry.
        sites
            .upsert_spec(
                &config.site.name,
                SiteSpec {
                    name: config.site.name.clone(),
                    is_self: true,
                    ..SiteSpec::default()
                },
            )
            .await?;

        let runtime = Self {
            bus,
            sites,
            catalogs,
            devices,
            models,
            solutions,
            instances,
            targets,
            activations,
            staging,
            reconciler,
            sync,
            site_id: config.site.name.clone(),
        };
        runtime.wire_subscriptions(upstream, cancel).await;
        Ok(runtime)
    }

    /// Application state for the HTTP layer.
    #[must_use]
    pub fn app_state(&self) -> api::AppState {
        api::AppState {
            sites: self.sites.clone(),
            catalogs: self.catalogs.clone(),
            staging: self.staging.clone(),
            reconciler: self.reconciler.clone(),
            bus: self.bus.clone(),
            site_id: self.site_id.clone(),
        }
    }

    async fn wire_subscriptions(&self, upstream: Option<UpstreamClient>, cancel: CancellationToken) {
        // catalog: explode one publication into a staged job per site.
        {
            let sites = self.sites.clone();
            let staging = self.staging.clone();
            self.bus
                .subscribe_fn(topics::CATALOG, move |_, event| {
                    let sites = sites.clone();
                    let staging = staging.clone();
                    async move {
                        let spec: CatalogSpec = event.body_as()?;
                        let job =
                            JobData::new(&spec.name, JobAction::Update, JobObjectType::Catalog);
                        for site in sites.list_specs().await? {
                            let staged = Event::from_body(&job)?.with_metadata("site", &site.id);
                            if let Err(e) = staging.handle_job_event(&staged).await {
                                warn!(site = %site.id, error = %e, "failed to stage catalog job");
                            }
                        }
                        Ok(())
                    }
                })
                .await;
        }

        // remote: stage work for the site named in the event metadata.
        {
            let staging = self.staging.clone();
            self.bus
                .subscribe_fn(topics::REMOTE, move |_, event| {
                    let staging = staging.clone();
                    async move {
                        if event.metadata("site").is_none() {
                            return Err(
                                ControlError::bad_request("site is not supplied").into()
                            );
                        }
                        staging.handle_job_event(&event).await?;
                        Ok(())
                    }
                })
                .await;
        }

        // report: forward activation statuses to the upstream. The handler
        // answers with an error even after a successful forward; callers
        // treat report delivery as fire-and-forget.
        {
            self.bus
                .subscribe_fn(topics::REPORT, move |_, event| {
                    let upstream = upstream.clone();
                    async move {
                        if let Ok(status) = event.body_as::<ActivationStatus>() {
                            if let Some(client) = &upstream {
                                client.report(&status).await?;
                            }
                        }
                        Err(ControlError::bad_request("report is not an activation status").into())
                    }
                })
                .await;
        }

        // job: dispatch reconciliations.
        {
            let reconciler = self.reconciler.clone();
            self.bus
                .subscribe_fn(topics::JOB, move |_, event| {
                    let reconciler = reconciler.clone();
                    let cancel = cancel.clone();
                    async move {
                        let scope = event.metadata("scope").unwrap_or_default().to_owned();
                        let job: JobData = event.body_as()?;
                        reconciler.handle_job(&scope, &job, &cancel).await?;
                        Ok(())
                    }
                })
                .await;
        }
    }
}

impl std::fmt::Debug for FederationRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationRuntime")
            .field("site_id", &self.site_id)
            .finish_non_exhaustive()
    }
}

/// The federation control service.
pub struct FederationService {
    config: ControlConfig,
    cancel: CancellationToken,
}

impl FederationService {
    /// Create a service with the given configuration.
    #[must_use]
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the control service until a shutdown signal arrives.
    pub async fn run(&self) -> ControlResult<()> {
        let runtime = FederationRuntime::build(&self.config, self.cancel.clone()).await?;
        info!(site = %runtime.site_id, "federation runtime initialised");

        if let Some(sync) = runtime.sync.clone() {
            let cancel = self.cancel.clone();
            tokio::spawn(async move { sync.run(cancel).await });
        }

        let app = api::router(runtime.app_state());
        let listener = tokio::net::TcpListener::bind(self.config.server.listen_addr)
            .await
            .map_err(|e| ControlError::internal(format!("failed to bind: {e}")))?;
        info!(listen_addr = %self.config.server.listen_addr, "control service listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.cancel.clone()))
            .await
            .map_err(|e| ControlError::internal(format!("server error: {e}")))?;

        info!("control service shutdown complete");
        Ok(())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for FederationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationService").finish_non_exhaustive()
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
        () = cancel.cancelled() => {
            info!("shutdown requested");
        }
    }
}
