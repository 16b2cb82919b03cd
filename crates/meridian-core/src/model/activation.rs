//! Activation status: the outcome of one reconciliation attempt.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall phase of an activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPhase {
    /// Queued, not yet reconciled.
    #[default]
    Pending,
    /// Reconciliation in flight.
    Running,
    /// Every planned step completed.
    Succeeded,
    /// At least one component failed.
    Failed,
}

impl ActivationPhase {
    /// Phase name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// What the reconciler did (or decided not to do) to one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPhase {
    /// Observed state already matched the desired state.
    NoOp,
    /// Component was applied to the target.
    Applied,
    /// Component was removed from the target.
    Removed,
    /// Provider call failed permanently.
    Failed,
    /// Skipped because an upstream dependency failed.
    Deferred,
}

impl ComponentPhase {
    /// True for [`ComponentPhase::Applied`] and [`ComponentPhase::Removed`].
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Applied | Self::Removed)
    }
}

/// Per-component reconciliation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResult {
    /// What happened to the component.
    pub status: ComponentPhase,
    /// Deployment generation the component was observed at. Never exceeds
    /// the generation of the deployment that produced this result.
    pub observed_generation: u64,
    /// Human-readable detail, typically the provider error on failure.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// True when the step was a removal.
    #[serde(default)]
    pub is_removal: bool,
}

/// Status of one reconciliation attempt, reported per instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStatus {
    /// Instance the activation belongs to.
    pub instance_id: String,
    /// Deployment generation that was reconciled.
    pub generation: u64,
    /// Overall phase.
    pub status: ActivationPhase,
    /// Per-component outcomes.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentResult>,
    /// Pipeline stage that produced this status.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stage: String,
    /// Next stage, when the pipeline continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stage: Option<String>,
    /// Error detail when the activation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the status was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names() {
        assert_eq!(ActivationPhase::Succeeded.as_str(), "succeeded");
        assert_eq!(ActivationPhase::default().as_str(), "pending");
    }

    #[test]
    fn mutation_phases() {
        assert!(ComponentPhase::Applied.is_mutation());
        assert!(ComponentPhase::Removed.is_mutation());
        assert!(!ComponentPhase::NoOp.is_mutation());
        assert!(!ComponentPhase::Deferred.is_mutation());
    }

    #[test]
    fn status_round_trips_through_json() {
        let mut status = ActivationStatus {
            instance_id: "i1".to_owned(),
            generation: 3,
            status: ActivationPhase::Succeeded,
            stage: "deploy".to_owned(),
            ..ActivationStatus::default()
        };
        status.components.insert(
            "web".to_owned(),
            ComponentResult {
                status: ComponentPhase::Applied,
                observed_generation: 3,
                message: String::new(),
                is_removal: false,
            },
        );

        let json = serde_json::to_string(&status).unwrap();
        let back: ActivationStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back.instance_id, "i1");
        assert_eq!(back.components["web"].status, ComponentPhase::Applied);
        assert!(back.components["web"].observed_generation <= back.generation);
    }
}
