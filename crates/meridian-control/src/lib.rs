//! Meridian control plane.
//!
//! The control-plane core of a multi-site edge orchestrator. A central
//! control site federates with remote child sites; every site runs this
//! same binary in a different role. The crate provides:
//!
//! - **Registry managers**: typed CRUD per resource kind over the state
//!   store, with envelope shaping and semantic validation
//! - **Staging**: per-site work queues with coalescing, drained by the
//!   pull-based sync endpoint
//! - **Sync**: the child-site pull loop applying upstream catalogs locally
//! - **Reconciliation**: planning and executing component apply/remove
//!   against target providers
//! - **API surface**: the `federation/*` and `solution/*` HTTP endpoints
//!
//! # Flow
//!
//! A catalog upsert publishes on the `catalog` topic; the federation wiring
//! fans the event out into one staged job per registered site. Child sites
//! pull batches through `federation/sync`, apply the catalogs locally, and
//! post activation statuses back. Independently, deployment requests are
//! reconciled against targets and reported on `job-report`.

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod managers;
pub mod reconcile;
pub mod service;
pub mod staging;
pub mod sync;

// Re-export commonly used types at the crate root
pub use config::ControlConfig;
pub use error::{ControlError, ControlResult};
pub use managers::{
    ActivationsManager, CatalogsManager, DevicesManager, InstancesManager, ModelsManager,
    SitesManager, SolutionsManager, TargetsManager,
};
pub use reconcile::{MockTargetProvider, Reconciler, TargetProvider};
pub use service::{FederationRuntime, FederationService};
pub use staging::{StagingEntry, StagingManager};
pub use sync::{SyncManager, UpstreamClient};
