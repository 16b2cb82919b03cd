//! Target providers: the capability interface the reconciler drives.
//!
//! A provider knows how to observe, apply, and remove components on one
//! class of target runtime. Providers classify their failures: `Transient`
//! errors are retried by the reconciler, `Fatal` errors mark the component
//! failed and halt its dependents.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;

use meridian_core::model::{ComponentSpec, DeploymentSpec};

use crate::config::{ProviderConfig, ProviderType};
use crate::error::{ControlError, ControlResult};

/// Apply/Get/Remove over a concrete runtime.
#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// Snapshot the components currently present on a target.
    async fn get(
        &self,
        target: &str,
        deployment: &DeploymentSpec,
    ) -> ControlResult<Vec<ComponentSpec>>;

    /// Create or update one component on a target.
    async fn apply(
        &self,
        target: &str,
        deployment: &DeploymentSpec,
        component: &ComponentSpec,
    ) -> ControlResult<()>;

    /// Remove one component from a target. Removing an absent component is
    /// not an error.
    async fn remove(
        &self,
        target: &str,
        deployment: &DeploymentSpec,
        component: &ComponentSpec,
    ) -> ControlResult<()>;
}

/// Create a provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> ControlResult<Arc<dyn TargetProvider>> {
    match config.provider_type {
        ProviderType::Mock => Ok(Arc::new(MockTargetProvider::default())),
        ProviderType::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                ControlError::missing_config("provider.url is required for the http provider")
            })?;
            Ok(Arc::new(HttpTargetProvider::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

/// In-memory provider for tests and dry runs.
///
/// Records every call and supports scripted failures per component.
#[derive(Default)]
pub struct MockTargetProvider {
    state: DashMap<String, Vec<ComponentSpec>>,
    calls: std::sync::Mutex<Vec<String>>,
    transient_failures: DashMap<String, u32>,
    fatal_components: DashMap<String, String>,
}

impl MockTargetProvider {
    /// Create an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` apply/remove calls for a component with a
    /// transient error.
    pub fn fail_transient(&self, component: &str, times: u32) {
        self.transient_failures.insert(component.to_owned(), times);
    }

    /// Fail every apply/remove call for a component with a fatal error.
    pub fn fail_fatal(&self, component: &str, message: &str) {
        self.fatal_components
            .insert(component.to_owned(), message.to_owned());
    }

    /// Calls recorded so far, in order, as `op:target:component`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    /// Components currently present on a target.
    #[must_use]
    pub fn components_on(&self, target: &str) -> Vec<ComponentSpec> {
        self.state
            .get(target)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    fn record(&self, entry: String) {
        self.calls.lock().expect("call log poisoned").push(entry);
    }

    fn scripted_failure(&self, component: &str) -> Option<ControlError> {
        if let Some(message) = self.fatal_components.get(component) {
            return Some(ControlError::fatal(message.value().clone()));
        }
        if let Some(mut remaining) = self.transient_failures.get_mut(component) {
            if *remaining > 0 {
                *remaining -= 1;
                return Some(ControlError::transient(format!(
                    "scripted transient failure for {component}"
                )));
            }
        }
        None
    }
}

#[async_trait]
impl TargetProvider for MockTargetProvider {
    async fn get(
        &self,
        target: &str,
        _deployment: &DeploymentSpec,
    ) -> ControlResult<Vec<ComponentSpec>> {
        self.record(format!("get:{target}"));
        Ok(self.components_on(target))
    }

    async fn apply(
        &self,
        target: &str,
        _deployment: &DeploymentSpec,
        component: &ComponentSpec,
    ) -> ControlResult<()> {
        self.record(format!("apply:{target}:{}", component.name));
        if let Some(err) = self.scripted_failure(&component.name) {
            return Err(err);
        }

        let mut components = self.state.entry(target.to_owned()).or_default();
        match components.iter_mut().find(|c| c.name == component.name) {
            Some(existing) => *existing = component.clone(),
            None => components.push(component.clone()),
        }
        Ok(())
    }

    async fn remove(
        &self,
        target: &str,
        _deployment: &DeploymentSpec,
        component: &ComponentSpec,
    ) -> ControlResult<()> {
        self.record(format!("remove:{target}:{}", component.name));
        if let Some(err) = self.scripted_failure(&component.name) {
            return Err(err);
        }

        if let Some(mut components) = self.state.get_mut(target) {
            components.retain(|c| c.name != component.name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockTargetProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTargetProvider").finish_non_exhaustive()
    }
}

/// Proxy provider forwarding to a remote control plane's deployment
/// endpoint.
#[derive(Debug, Clone)]
pub struct HttpTargetProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTargetProvider {
    /// Create a proxy provider against a base URL.
    pub fn new(url: impl Into<String>, timeout: Duration) -> ControlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ControlError::Http)?;
        Ok(Self {
            client,
            base_url: url.into().trim_end_matches('/').to_owned(),
        })
    }

    fn classify(status: StatusCode, body: String) -> ControlError {
        if status.is_client_error() {
            ControlError::fatal(format!("provider rejected request ({status}): {body}"))
        } else {
            ControlError::transient(format!("provider unavailable ({status}): {body}"))
        }
    }

    /// Deployment restricted to one component, as the remote side applies
    /// whole deployments.
    fn scoped_deployment(deployment: &DeploymentSpec, component: &ComponentSpec) -> DeploymentSpec {
        let mut scoped = deployment.clone();
        scoped.solution.components = vec![component.clone()];
        scoped
    }
}

#[async_trait]
impl TargetProvider for HttpTargetProvider {
    async fn get(
        &self,
        _target: &str,
        deployment: &DeploymentSpec,
    ) -> ControlResult<Vec<ComponentSpec>> {
        let url = format!("{}/solution/instances", self.base_url);
        let response = self
            .client
            .get(&url)
            .json(deployment)
            .send()
            .await
            .map_err(|e| ControlError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        response.json().await.map_err(ControlError::Http)
    }

    async fn apply(
        &self,
        _target: &str,
        deployment: &DeploymentSpec,
        component: &ComponentSpec,
    ) -> ControlResult<()> {
        let url = format!("{}/solution/instances", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&Self::scoped_deployment(deployment, component))
            .send()
            .await
            .map_err(|e| ControlError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        Ok(())
    }

    async fn remove(
        &self,
        _target: &str,
        deployment: &DeploymentSpec,
        component: &ComponentSpec,
    ) -> ControlResult<()> {
        let url = format!("{}/solution/instances", self.base_url);
        let response = self
            .client
            .delete(&url)
            .json(&Self::scoped_deployment(deployment, component))
            .send()
            .await
            .map_err(|e| ControlError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str) -> ComponentSpec {
        ComponentSpec {
            name: name.to_owned(),
            component_type: "container".to_owned(),
            ..ComponentSpec::default()
        }
    }

    #[tokio::test]
    async fn mock_provider_lifecycle() {
        let provider = MockTargetProvider::new();
        let deployment = DeploymentSpec::default();

        provider
            .apply("t1", &deployment, &component("web"))
            .await
            .expect("apply failed");
        assert_eq!(provider.components_on("t1").len(), 1);

        let observed = provider.get("t1", &deployment).await.unwrap();
        assert_eq!(observed[0].name, "web");

        provider
            .remove("t1", &deployment, &component("web"))
            .await
            .expect("remove failed");
        assert!(provider.components_on("t1").is_empty());

        assert_eq!(
            provider.calls(),
            vec!["apply:t1:web", "get:t1", "remove:t1:web"]
        );
    }

    #[tokio::test]
    async fn scripted_transient_failures_expire() {
        let provider = MockTargetProvider::new();
        provider.fail_transient("web", 2);
        let deployment = DeploymentSpec::default();

        for _ in 0..2 {
            let err = provider
                .apply("t1", &deployment, &component("web"))
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }
        provider
            .apply("t1", &deployment, &component("web"))
            .await
            .expect("third attempt should succeed");
    }

    #[tokio::test]
    async fn scripted_fatal_failures_persist() {
        let provider = MockTargetProvider::new();
        provider.fail_fatal("web", "unsupported component type");
        let deployment = DeploymentSpec::default();

        for _ in 0..2 {
            let err = provider
                .apply("t1", &deployment, &component("web"))
                .await
                .unwrap_err();
            assert!(matches!(err, ControlError::Fatal(_)));
        }
    }

    #[tokio::test]
    async fn removing_absent_component_is_ok() {
        let provider = MockTargetProvider::new();
        provider
            .remove("t1", &DeploymentSpec::default(), &component("ghost"))
            .await
            .expect("remove of absent component must be idempotent");
    }

    #[test]
    fn create_provider_requires_url_for_http() {
        let config = ProviderConfig {
            provider_type: ProviderType::Http,
            url: None,
            timeout_secs: 60,
        };
        assert!(matches!(
            create_provider(&config),
            Err(ControlError::MissingConfig(_))
        ));

        let config = ProviderConfig {
            provider_type: ProviderType::Mock,
            url: None,
            timeout_secs: 60,
        };
        assert!(create_provider(&config).is_ok());
    }
}
