//! Configuration for meridian-control.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{ControlError, ControlResult};

/// Top-level configuration for the federation control service.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ControlConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity of this site.
    #[serde(default)]
    pub site: SiteConfig,

    /// Upstream federation endpoint; absent on the control site.
    #[serde(default)]
    pub upstream: Option<UpstreamConfig>,

    /// Staging queue behaviour.
    #[serde(default)]
    pub staging: StagingConfig,

    /// Reconciler behaviour.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Target provider selection.
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl ControlConfig {
    /// Load configuration from the default sources.
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. `meridian.toml` in the current directory (if present)
    /// 3. Environment variables with `MERIDIAN_` prefix
    pub fn load() -> ControlResult<Self> {
        Figment::new()
            .merge(Toml::file("meridian.toml"))
            .merge(Env::prefixed("MERIDIAN_").split("__"))
            .extract()
            .map_err(|e| ControlError::missing_config(e.to_string()))
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ControlResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MERIDIAN_").split("__"))
            .extract()
            .map_err(|e| ControlError::missing_config(e.to_string()))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8082)
}

const fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Identity of the current site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site name registered in the federation.
    #[serde(default = "default_site_name")]
    pub name: String,
}

fn default_site_name() -> String {
    "hq".to_owned()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
        }
    }
}

/// Upstream federation endpoint configuration for child sites.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream control plane, e.g. `http://hq:8082`.
    pub url: String,

    /// Pull interval in seconds.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_sync_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_sync_interval_secs() -> u64 {
    15
}

const fn default_sync_timeout_secs() -> u64 {
    30
}

/// Staging queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Maximum entries drained per pull.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

const fn default_batch_size() -> usize {
    64
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Maximum reconciliations in flight across instances.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Timeout for a single provider call in seconds.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Overall timeout for one reconciliation in seconds.
    #[serde(default = "default_total_timeout_secs")]
    pub total_timeout_secs: u64,

    /// Attempts per provider call on transient errors.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_worker_pool_size() -> usize {
    8
}

const fn default_step_timeout_secs() -> u64 {
    60
}

const fn default_total_timeout_secs() -> u64 {
    300 // 5 minutes
}

const fn default_max_attempts() -> u32 {
    3
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            step_timeout_secs: default_step_timeout_secs(),
            total_timeout_secs: default_total_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Type of target provider to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// In-memory provider for tests and dry runs.
    #[default]
    Mock,

    /// Proxy provider forwarding to a remote control plane.
    Http,
}

/// Target provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Which provider implementation to use.
    #[serde(default)]
    pub provider_type: ProviderType,

    /// Base URL for the HTTP proxy provider.
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in seconds for the HTTP proxy provider.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_provider_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ControlConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8082);
        assert_eq!(config.site.name, "hq");
        assert!(config.upstream.is_none());
        assert_eq!(config.staging.batch_size, 64);
        assert_eq!(config.reconciler.worker_pool_size, 8);
        assert_eq!(config.reconciler.total_timeout_secs, 300);
        assert_eq!(config.provider.provider_type, ProviderType::Mock);
    }

    #[test]
    fn config_from_toml() {
        let toml = r#"
            [server]
            listen_addr = "127.0.0.1:9000"

            [site]
            name = "edge1"

            [upstream]
            url = "http://hq:8082/v1"
            sync_interval_secs = 5

            [staging]
            batch_size = 16

            [provider]
            provider_type = "http"
            url = "http://worker:8082/v1"
        "#;

        let config: ControlConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.site.name, "edge1");

        let upstream = config.upstream.unwrap();
        assert_eq!(upstream.url, "http://hq:8082/v1");
        assert_eq!(upstream.sync_interval_secs, 5);
        assert_eq!(upstream.timeout_secs, 30);

        assert_eq!(config.staging.batch_size, 16);
        assert_eq!(config.provider.provider_type, ProviderType::Http);
    }
}
