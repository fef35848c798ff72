//! Observability Gateway Controller
//!
//! Reconciles `ObservabilityGateway` resources: every class declared on a
//! gateway becomes one OpenTelemetry collector Deployment and one ClusterIP
//! Service named `{gateway}-{class}`, owned by the gateway. Children of
//! classes that disappear from `spec.classes` are deleted.

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconcile_helpers;
mod reconciler;
mod watcher;
#[cfg(test)]
mod test_utils;

use config::ControllerConfig;
use controller::Controller;
use crate::error::ControllerError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Observability Gateway Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Resync interval: {:?}", config.resync_interval);
    info!("  Concurrency: {}, debounce: {:?}", config.concurrency, config.debounce);
    info!("  Backoff: {}m..{}m, conflict requeue: {:?}", config.backoff_min_minutes, config.backoff_max_minutes, config.conflict_requeue);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
