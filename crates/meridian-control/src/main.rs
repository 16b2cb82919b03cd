//! Meridian control service binary.
//!
//! Runs the federation and reconciliation control plane for one site.

use tracing::info;
use tracing_subscriber::EnvFilter;

use meridian_control::{ControlConfig, FederationService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("meridian_control=info".parse()?),
        )
        .init();

    info!("Meridian control service starting");

    let config = ControlConfig::load().unwrap_or_else(|e| {
        info!(error = %e, "failed to load config, using defaults");
        ControlConfig::default()
    });

    info!(
        listen_addr = %config.server.listen_addr,
        site = %config.site.name,
        upstream = config.upstream.as_ref().map(|u| u.url.as_str()).unwrap_or("none"),
        "configuration loaded"
    );

    let service = FederationService::new(config);
    service.run().await?;

    Ok(())
}
