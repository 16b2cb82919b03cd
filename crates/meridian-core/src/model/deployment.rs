//! Deployment spec and summary.
//!
//! A [`DeploymentSpec`] is a derived view assembled from an instance, its
//! solution, and the resolved targets. It is the input to reconciliation and
//! is never persisted on its own.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{ComponentResult, InstanceSpec, SolutionSpec, TargetSpec};

/// The fully resolved input to one reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    /// Name of the solution being deployed.
    pub solution_name: String,
    /// The solution document, components and dependencies resolved.
    pub solution: SolutionSpec,
    /// The instance binding this deployment realises.
    pub instance: InstanceSpec,
    /// Resolved targets by name.
    #[serde(default)]
    pub targets: HashMap<String, TargetSpec>,
    /// Component name to target name assignment.
    #[serde(default)]
    pub assignments: HashMap<String, String>,
    /// Monotonically increasing deployment generation.
    #[serde(default)]
    pub generation: u64,
}

impl DeploymentSpec {
    /// Target assigned to a component; falls back to the instance's named
    /// target when no explicit assignment exists.
    #[must_use]
    pub fn target_for(&self, component: &str) -> Option<&str> {
        self.assignments
            .get(component)
            .map(String::as_str)
            .or(self.instance.target.name.as_deref())
    }
}

/// Aggregate outcome of one reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    /// Generation that was reconciled.
    pub generation: u64,
    /// True when the reconciliation removed the deployment.
    #[serde(default)]
    pub removal: bool,
    /// Per-component outcomes.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentResult>,
    /// Components that applied or removed cleanly, plus no-ops.
    pub succeeded: usize,
    /// Components that failed permanently.
    pub failed: usize,
    /// Components skipped because a dependency failed.
    pub deferred: usize,
    /// Aggregate detail message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl DeploymentSummary {
    /// True when nothing failed or was deferred.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        self.failed == 0 && self.deferred == 0
    }

    /// Number of components that were actually mutated on a target.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.components
            .values()
            .filter(|c| c.status.is_mutation())
            .count()
    }
}
