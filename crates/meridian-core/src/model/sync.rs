//! Sync package: the response to a federation pull.

use serde::{Deserialize, Serialize};

use crate::model::{CatalogSpec, JobData};

/// Everything a child site receives from one pull against its upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPackage {
    /// Site id of the upstream that produced the package.
    pub origin: String,
    /// Full catalog bodies to apply locally.
    #[serde(default)]
    pub catalogs: Vec<CatalogSpec>,
    /// Runnable jobs to dispatch locally.
    #[serde(default)]
    pub jobs: Vec<JobData>,
}

impl SyncPackage {
    /// An empty package from the given origin.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            catalogs: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// True when the package carries no work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty() && self.jobs.is_empty()
    }
}
