//! Job data: the unit of work queued for federation sync and reconciliation.

use serde::{Deserialize, Serialize};

/// What the job asks the receiving site to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobAction {
    /// Apply the referenced object.
    #[serde(rename = "UPDATE")]
    Update,
    /// Delete the referenced object.
    #[serde(rename = "DELETE")]
    Delete,
    /// Execute the referenced object (a runnable catalog or workflow).
    #[serde(rename = "RUN")]
    Run,
}

impl JobAction {
    /// Action name as transmitted on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Run => "RUN",
        }
    }
}

/// What kind of object the job references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobObjectType {
    /// A solution instance.
    Instance,
    /// A target.
    Target,
    /// A catalog document.
    Catalog,
}

impl JobObjectType {
    /// Object type name as transmitted on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Target => "target",
            Self::Catalog => "catalog",
        }
    }
}

/// One queued unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    /// Referenced object id.
    pub id: String,
    /// Requested action.
    pub action: JobAction,
    /// Referenced object kind.
    pub object_type: JobObjectType,
}

impl JobData {
    /// Create a job.
    #[must_use]
    pub fn new(id: impl Into<String>, action: JobAction, object_type: JobObjectType) -> Self {
        Self {
            id: id.into(),
            action,
            object_type,
        }
    }

    /// Coalescing key: jobs with the same fingerprint supersede each other
    /// in a staging queue.
    #[must_use]
    pub fn fingerprint(&self) -> (JobObjectType, &str, JobAction) {
        (self.object_type, self.id.as_str(), self.action)
    }
}
