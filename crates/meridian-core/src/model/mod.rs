//! Registry resource model.
//!
//! Every resource kind follows the same envelope paradigm: a `Spec` document
//! written by clients, an optional `Status` written by the control plane, and
//! a `State` wrapper `{ id, spec, status }` as read back from the registry.

mod activation;
mod ai_model;
mod catalog;
mod deployment;
mod device;
mod instance;
mod job;
mod site;
mod solution;
mod sync;
mod target;

pub use activation::{ActivationPhase, ActivationStatus, ComponentPhase, ComponentResult};
pub use ai_model::{ModelSpec, ModelState};
pub use catalog::{CatalogSpec, CatalogState, CatalogStatus, ObjectRef, EDGE_CATALOG_TYPE};
pub use deployment::{DeploymentSpec, DeploymentSummary};
pub use device::{DeviceSpec, DeviceState};
pub use instance::{InstanceSpec, InstanceState, TargetSelector};
pub use job::{JobAction, JobData, JobObjectType};
pub use site::{SiteSpec, SiteState, SiteStatus};
pub use solution::{ComponentSpec, SolutionSpec, SolutionState};
pub use sync::SyncPackage;
pub use target::{TargetSpec, TargetState};

/// Loose, schemaless property bag carried by catalogs and components.
pub type Properties = serde_json::Map<String, serde_json::Value>;
