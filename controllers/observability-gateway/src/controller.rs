//! Main controller implementation.
//!
//! Wires the state store, reconciler and metrics together, then runs the
//! gateway watcher alongside the health/metrics server.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::{Context, Watcher};
use kube::Api;
use state_store::KubeStateStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for ObservabilityGateway resources.
pub struct Controller {
    gateway_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Observability Gateway Controller");

        let store = KubeStateStore::try_default().await?;
        let client = store.client().clone();

        let (gateway_api, deployment_api, service_api) = match config.namespace.as_deref() {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client, ns),
            ),
            None => (Api::all(client.clone()), Api::all(client.clone()), Api::all(client)),
        };

        let reconciler = Reconciler::new(store, config.resync_interval)
            .with_backoff(config.backoff_min_minutes, config.backoff_max_minutes);
        let metrics = Arc::new(Metrics::new()?);

        let context = Arc::new(Context {
            reconciler: Arc::new(reconciler),
            metrics: metrics.clone(),
            conflict_requeue: config.conflict_requeue,
        });
        let watcher = Watcher::new(context, gateway_api, deployment_api, service_api, &config);

        let gateway_watcher = tokio::spawn(watcher.watch_gateways());
        let metrics_server = tokio::spawn(metrics::serve(config.metrics_addr, metrics));

        Ok(Self {
            gateway_watcher,
            metrics_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Observability Gateway Controller running");

        // The watcher returns on shutdown signal; the server should never exit.
        tokio::select! {
            result = &mut self.gateway_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ObservabilityGateway watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("ObservabilityGateway watcher error: {}", e)))?;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
            }
        }

        self.metrics_server.abort();
        info!("Observability Gateway Controller stopped");
        Ok(())
    }
}
