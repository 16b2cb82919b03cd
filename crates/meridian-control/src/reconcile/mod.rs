//! Reconciliation engine.
//!
//! Turns a [`DeploymentSpec`] into a sequence of per-component apply/remove
//! calls against target providers:
//!
//! 1. **Plan**: topologically order components by their dependencies.
//! 2. **Observe**: snapshot each target and diff desired vs observed with
//!    semantic equality.
//! 3. **Execute**: walk the plan; retry transient failures, halt dependents
//!    of fatally failed components, let independent siblings continue.
//! 4. **Summarise**: aggregate per-component outcomes.
//! 5. **Persist**: record an activation status and announce `job-report`.
//!
//! Reconciliations are serialised per instance and bounded globally by a
//! worker pool. Two back-to-back runs with the same input leave the targets
//! unchanged: the second plans all no-ops.

mod provider;

pub use provider::{create_provider, HttpTargetProvider, MockTargetProvider, TargetProvider};

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use meridian_core::bus::{topics, Event, EventBus};
use meridian_core::compare::DeepEquals;
use meridian_core::model::{
    ActivationPhase, ActivationStatus, ComponentPhase, ComponentResult, ComponentSpec,
    DeploymentSpec, DeploymentSummary, JobAction, JobData, JobObjectType, SolutionSpec,
    TargetSpec,
};

use crate::config::ReconcilerConfig;
use crate::error::{ControlError, ControlResult};
use crate::managers::{ActivationsManager, InstancesManager, SolutionsManager, TargetsManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanAction {
    Apply,
    Remove,
    NoOp,
}

#[derive(Debug)]
struct PlanStep {
    component: ComponentSpec,
    target: String,
    action: PlanAction,
    /// Components whose failure blocks this step: dependencies when
    /// applying, dependents when removing.
    blockers: Vec<String>,
}

/// Drives deployments to their desired state through target providers.
pub struct Reconciler {
    provider: Arc<dyn TargetProvider>,
    activations: Arc<ActivationsManager>,
    instances: Arc<InstancesManager>,
    solutions: Arc<SolutionsManager>,
    targets: Arc<TargetsManager>,
    bus: Arc<EventBus>,
    config: ReconcilerConfig,
    instance_locks: DashMap<String, Arc<Mutex<()>>>,
    pool: Arc<Semaphore>,
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        provider: Arc<dyn TargetProvider>,
        activations: Arc<ActivationsManager>,
        instances: Arc<InstancesManager>,
        solutions: Arc<SolutionsManager>,
        targets: Arc<TargetsManager>,
        bus: Arc<EventBus>,
        config: ReconcilerConfig,
    ) -> Self {
        let pool = Arc::new(Semaphore::new(config.worker_pool_size.max(1)));
        Self {
            provider,
            activations,
            instances,
            solutions,
            targets,
            bus,
            config,
            instance_locks: DashMap::new(),
            pool,
        }
    }

    /// Read the observed components for a deployment from its targets.
    pub async fn get(
        &self,
        deployment: DeploymentSpec,
    ) -> ControlResult<(DeploymentSpec, Vec<ComponentSpec>)> {
        let mut observed = Vec::new();
        for target in self.distinct_targets(&deployment)? {
            match self.provider.get(&target, &deployment).await {
                Ok(mut components) => observed.append(&mut components),
                Err(e) => {
                    warn!(target = %target, error = %e, "target observation failed");
                }
            }
        }
        Ok((deployment, observed))
    }

    /// Reconcile a deployment; with `remove` set, tear it down instead.
    ///
    /// Returns the summary even when components fail; an `Err` means the
    /// reconciliation itself could not run (invalid spec, cancellation,
    /// persistence failure).
    pub async fn reconcile(
        &self,
        deployment: DeploymentSpec,
        remove: bool,
        scope: &str,
        cancel: &CancellationToken,
    ) -> ControlResult<DeploymentSummary> {
        let instance = deployment.instance.name.clone();
        if instance.is_empty() {
            return Err(ControlError::bad_request("deployment carries no instance name"));
        }

        // Planning happens before any lock or provider call so invalid
        // specs fail fast.
        let mut order = order_components(&deployment.solution.components)?;
        if remove {
            order.reverse();
        }

        let lock = self
            .instance_locks
            .entry(instance.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|_| ControlError::internal("reconciler pool closed"))?;

        info!(
            instance = %instance,
            generation = deployment.generation,
            remove,
            components = order.len(),
            "reconciliation started"
        );

        let steps = self.plan(&deployment, order, remove).await?;
        if cancel.is_cancelled() {
            return Err(ControlError::Cancelled);
        }

        let results = self.execute(&deployment, &steps, cancel).await?;
        let summary = summarise(&deployment, remove, results);

        self.persist(scope, &instance, &summary).await?;

        info!(
            instance = %instance,
            succeeded = summary.succeeded,
            failed = summary.failed,
            deferred = summary.deferred,
            "reconciliation finished"
        );
        Ok(summary)
    }

    /// Latest recorded summary for an instance.
    pub async fn get_summary(&self, scope: &str, instance: &str) -> ControlResult<DeploymentSummary> {
        let status = self.activations.get_status(scope, instance).await?;
        Ok(summary_from_status(&status))
    }

    /// Materialise the deployment view for a registered instance.
    pub async fn deployment_for_instance(
        &self,
        scope: &str,
        instance_id: &str,
    ) -> ControlResult<DeploymentSpec> {
        let instance = self
            .instances
            .get_spec(scope, instance_id)
            .await?
            .spec
            .ok_or_else(|| ControlError::invalid_spec(format!("instance {instance_id} has no spec")))?;

        let solution = self
            .solutions
            .get_spec(scope, &instance.solution)
            .await?
            .spec
            .ok_or_else(|| {
                ControlError::invalid_spec(format!("solution {} has no spec", instance.solution))
            })?;

        let targets = self.resolve_targets(scope, &instance.target).await?;
        self.assemble(instance.solution.clone(), solution, instance, targets, scope, instance_id)
            .await
    }

    /// Materialise a deployment that manages a target's own components.
    pub async fn deployment_for_target(
        &self,
        scope: &str,
        target_id: &str,
    ) -> ControlResult<DeploymentSpec> {
        let spec = self
            .targets
            .get_spec(scope, target_id)
            .await?
            .spec
            .ok_or_else(|| ControlError::invalid_spec(format!("target {target_id} has no spec")))?;

        let solution = SolutionSpec {
            components: spec.components.clone(),
            ..SolutionSpec::default()
        };
        let instance = meridian_core::model::InstanceSpec {
            name: format!("target-runtime-{target_id}"),
            solution: format!("target-runtime-{target_id}"),
            target: meridian_core::model::TargetSelector {
                name: Some(target_id.to_owned()),
                ..meridian_core::model::TargetSelector::default()
            },
            ..meridian_core::model::InstanceSpec::default()
        };
        let targets = HashMap::from([(target_id.to_owned(), spec)]);
        let name = instance.name.clone();
        self.assemble(name.clone(), solution, instance, targets, scope, &name)
            .await
    }

    /// Dispatch one queued reconciliation job.
    pub async fn handle_job(
        &self,
        scope: &str,
        job: &JobData,
        cancel: &CancellationToken,
    ) -> ControlResult<()> {
        let deployment = match job.object_type {
            JobObjectType::Instance => self.deployment_for_instance(scope, &job.id).await?,
            JobObjectType::Target => self.deployment_for_target(scope, &job.id).await?,
            JobObjectType::Catalog => {
                debug!(id = %job.id, "catalog jobs are handled by the sync pipeline");
                return Ok(());
            }
        };
        match job.action {
            JobAction::Update => {
                self.reconcile(deployment, false, scope, cancel).await?;
            }
            JobAction::Delete => {
                self.reconcile(deployment, true, scope, cancel).await?;
            }
            JobAction::Run => {
                debug!(id = %job.id, "RUN jobs are dispatched by workflow execution");
            }
        }
        Ok(())
    }

    async fn assemble(
        &self,
        solution_name: String,
        solution: SolutionSpec,
        instance: meridian_core::model::InstanceSpec,
        targets: HashMap<String, TargetSpec>,
        scope: &str,
        activation_key: &str,
    ) -> ControlResult<DeploymentSpec> {
        let primary = targets
            .keys()
            .min()
            .cloned()
            .ok_or_else(|| ControlError::invalid_spec("deployment resolves to no target"))?;
        let assignments = solution
            .components
            .iter()
            .map(|c| (c.name.clone(), primary.clone()))
            .collect();

        let generation = match self.activations.get_status(scope, activation_key).await {
            Ok(status) => status.generation + 1,
            Err(e) if e.is_not_found() => 1,
            Err(e) => return Err(e),
        };

        Ok(DeploymentSpec {
            solution_name,
            solution,
            instance,
            targets,
            assignments,
            generation,
        })
    }

    async fn resolve_targets(
        &self,
        scope: &str,
        selector: &meridian_core::model::TargetSelector,
    ) -> ControlResult<HashMap<String, TargetSpec>> {
        if let Some(name) = &selector.name {
            let spec = self
                .targets
                .get_spec(scope, name)
                .await?
                .spec
                .unwrap_or_default();
            return Ok(HashMap::from([(name.clone(), spec)]));
        }

        let mut matched = HashMap::new();
        for state in self.targets.list_specs(scope).await? {
            let Some(spec) = state.spec else { continue };
            let matches = selector.selector.iter().all(|(k, v)| {
                spec.constraints.get(k) == Some(v) || spec.properties.get(k) == Some(v)
            });
            if matches {
                matched.insert(state.id, spec);
            }
        }
        if matched.is_empty() {
            return Err(ControlError::invalid_spec(
                "instance selector matches no targets",
            ));
        }
        Ok(matched)
    }

    fn distinct_targets(&self, deployment: &DeploymentSpec) -> ControlResult<Vec<String>> {
        let mut targets: Vec<String> = if deployment.targets.is_empty() {
            let mut seen = HashSet::new();
            deployment
                .solution
                .components
                .iter()
                .filter_map(|c| deployment.target_for(&c.name))
                .filter(|t| seen.insert((*t).to_owned()))
                .map(ToOwned::to_owned)
                .collect()
        } else {
            deployment.targets.keys().cloned().collect()
        };
        targets.sort_unstable();
        if targets.is_empty() {
            return Err(ControlError::invalid_spec("deployment names no targets"));
        }
        Ok(targets)
    }

    async fn plan(
        &self,
        deployment: &DeploymentSpec,
        order: Vec<ComponentSpec>,
        remove: bool,
    ) -> ControlResult<Vec<PlanStep>> {
        let dependents = dependents_of(&deployment.solution.components);
        let mut observed: HashMap<String, Vec<ComponentSpec>> = HashMap::new();
        let mut steps = Vec::with_capacity(order.len());

        for component in order {
            let target = deployment
                .target_for(&component.name)
                .ok_or_else(|| {
                    ControlError::invalid_spec(format!(
                        "component {} is not assigned to any target",
                        component.name
                    ))
                })?
                .to_owned();

            let action = if remove {
                PlanAction::Remove
            } else {
                if !observed.contains_key(&target) {
                    let snapshot = match self.provider.get(&target, deployment).await {
                        Ok(components) => components,
                        Err(e) => {
                            // An unobservable target reads as empty: the
                            // apply path is idempotent either way.
                            warn!(target = %target, error = %e, "target observation failed");
                            Vec::new()
                        }
                    };
                    observed.insert(target.clone(), snapshot);
                }
                let current = observed.get(&target).map(Vec::as_slice).unwrap_or(&[]);
                if current.iter().any(|c| c.deep_equals(&component)) {
                    PlanAction::NoOp
                } else {
                    PlanAction::Apply
                }
            };

            let blockers = if remove {
                dependents.get(&component.name).cloned().unwrap_or_default()
            } else {
                component.dependencies.clone()
            };
            steps.push(PlanStep {
                component,
                target,
                action,
                blockers,
            });
        }
        Ok(steps)
    }

    async fn execute(
        &self,
        deployment: &DeploymentSpec,
        steps: &[PlanStep],
        cancel: &CancellationToken,
    ) -> ControlResult<BTreeMap<String, ComponentResult>> {
        let started = Instant::now();
        let total_timeout = Duration::from_secs(self.config.total_timeout_secs);
        let mut results = BTreeMap::new();
        let mut halted: HashSet<String> = HashSet::new();

        for step in steps {
            if cancel.is_cancelled() {
                return Err(ControlError::Cancelled);
            }
            let name = step.component.name.clone();
            let is_removal = step.action == PlanAction::Remove;

            if let Some(blocker) = step.blockers.iter().find(|b| halted.contains(*b)) {
                results.insert(
                    name.clone(),
                    ComponentResult {
                        status: ComponentPhase::Deferred,
                        observed_generation: deployment.generation,
                        message: format!("blocked by failed component {blocker}"),
                        is_removal,
                    },
                );
                halted.insert(name);
                continue;
            }

            if started.elapsed() >= total_timeout {
                results.insert(
                    name.clone(),
                    ComponentResult {
                        status: ComponentPhase::Deferred,
                        observed_generation: deployment.generation,
                        message: "reconciliation deadline exceeded".to_owned(),
                        is_removal,
                    },
                );
                halted.insert(name);
                continue;
            }

            let (status, message) = match step.action {
                PlanAction::NoOp => (ComponentPhase::NoOp, String::new()),
                PlanAction::Apply | PlanAction::Remove => {
                    match self.execute_step(step, deployment).await {
                        Ok(()) => {
                            let phase = if is_removal {
                                ComponentPhase::Removed
                            } else {
                                ComponentPhase::Applied
                            };
                            (phase, String::new())
                        }
                        Err(e) => {
                            warn!(component = %name, error = %e, "component step failed");
                            halted.insert(name.clone());
                            (ComponentPhase::Failed, e.to_string())
                        }
                    }
                }
            };
            results.insert(
                name,
                ComponentResult {
                    status,
                    observed_generation: deployment.generation,
                    message,
                    is_removal,
                },
            );
        }
        Ok(results)
    }

    async fn execute_step(&self, step: &PlanStep, deployment: &DeploymentSpec) -> ControlResult<()> {
        let step_timeout = Duration::from_secs(self.config.step_timeout_secs);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let call = async {
                match step.action {
                    PlanAction::Apply => {
                        self.provider
                            .apply(&step.target, deployment, &step.component)
                            .await
                    }
                    PlanAction::Remove => {
                        self.provider
                            .remove(&step.target, deployment, &step.component)
                            .await
                    }
                    PlanAction::NoOp => Ok(()),
                }
            };
            let err = match tokio::time::timeout(step_timeout, call).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => e,
                Err(_) => ControlError::transient("provider call timed out"),
            };
            if err.is_transient() && attempt < self.config.max_attempts {
                debug!(
                    component = %step.component.name,
                    attempt,
                    error = %err,
                    "retrying transient provider failure"
                );
                continue;
            }
            return Err(err);
        }
    }

    async fn persist(
        &self,
        scope: &str,
        instance: &str,
        summary: &DeploymentSummary,
    ) -> ControlResult<()> {
        let status = ActivationStatus {
            instance_id: instance.to_owned(),
            generation: summary.generation,
            status: if summary.failed > 0 {
                ActivationPhase::Failed
            } else {
                ActivationPhase::Succeeded
            },
            components: summary.components.clone(),
            stage: "reconcile".to_owned(),
            next_stage: None,
            error: (!summary.message.is_empty()).then(|| summary.message.clone()),
            updated_at: Some(Utc::now()),
        };
        self.activations.report_status(scope, instance, &status).await?;

        let event = Event::from_body(&status)?;
        self.bus.publish(topics::JOB_REPORT, event).await;
        Ok(())
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Topologically order components by their dependencies.
///
/// Duplicate names, unknown dependencies, and cycles all fail with
/// `InvalidSpec` before any provider call is made.
fn order_components(components: &[ComponentSpec]) -> ControlResult<Vec<ComponentSpec>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, component) in components.iter().enumerate() {
        if index.insert(component.name.as_str(), i).is_some() {
            return Err(ControlError::invalid_spec(format!(
                "duplicate component {}",
                component.name
            )));
        }
    }

    let mut indegree = vec![0usize; components.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    for (i, component) in components.iter().enumerate() {
        for dep in &component.dependencies {
            let Some(&j) = index.get(dep.as_str()) else {
                return Err(ControlError::invalid_spec(format!(
                    "component {} depends on unknown component {dep}",
                    component.name
                )));
            };
            indegree[i] += 1;
            dependents[j].push(i);
        }
    }

    let mut ready: VecDeque<usize> = (0..components.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(components.len());
    while let Some(i) = ready.pop_front() {
        order.push(components[i].clone());
        for &d in &dependents[i] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.push_back(d);
            }
        }
    }

    if order.len() != components.len() {
        return Err(ControlError::invalid_spec(
            "component dependencies form a cycle",
        ));
    }
    Ok(order)
}

/// Reverse dependency map: component name to the names that depend on it.
fn dependents_of(components: &[ComponentSpec]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for component in components {
        for dep in &component.dependencies {
            map.entry(dep.clone()).or_default().push(component.name.clone());
        }
    }
    map
}

fn summarise(
    deployment: &DeploymentSpec,
    remove: bool,
    results: BTreeMap<String, ComponentResult>,
) -> DeploymentSummary {
    let mut succeeded = 0;
    let mut failed = 0;
    let mut deferred = 0;
    let mut messages = Vec::new();
    for (name, result) in &results {
        match result.status {
            ComponentPhase::NoOp | ComponentPhase::Applied | ComponentPhase::Removed => {
                succeeded += 1;
            }
            ComponentPhase::Failed => {
                failed += 1;
                messages.push(format!("{name}: {}", result.message));
            }
            ComponentPhase::Deferred => deferred += 1,
        }
    }
    DeploymentSummary {
        generation: deployment.generation,
        removal: remove,
        components: results,
        succeeded,
        failed,
        deferred,
        message: messages.join("; "),
    }
}

fn summary_from_status(status: &ActivationStatus) -> DeploymentSummary {
    let mut succeeded = 0;
    let mut failed = 0;
    let mut deferred = 0;
    for result in status.components.values() {
        match result.status {
            ComponentPhase::NoOp | ComponentPhase::Applied | ComponentPhase::Removed => {
                succeeded += 1;
            }
            ComponentPhase::Failed => failed += 1,
            ComponentPhase::Deferred => deferred += 1,
        }
    }
    DeploymentSummary {
        generation: status.generation,
        removal: status.components.values().any(|c| c.is_removal),
        components: status.components.clone(),
        succeeded,
        failed,
        deferred,
        message: status.error.clone().unwrap_or_default(),
    }
}
