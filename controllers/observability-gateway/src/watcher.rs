//! Kubernetes resource watcher.
//!
//! Drives the reconciler from watch events using `kube_runtime::Controller`.
//! Gateways are the primary resource; Deployments and Services carrying the
//! class label are watched as owned children, so edits or deletions made
//! behind the controller's back trigger a pass for their gateway.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::desired::CLASS_LABEL;
use crate::reconciler::{GatewayKey, Reconciler};
use crds::ObservabilityGateway;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, ResourceExt};
use kube_runtime::{Controller, watcher, controller::{Action, Config as RuntimeConfig}};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconcile call
pub struct Context {
    pub reconciler: Arc<Reconciler>,
    pub metrics: Arc<Metrics>,
    pub conflict_requeue: Duration,
}

async fn reconcile(gateway: Arc<ObservabilityGateway>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = GatewayKey::from_gateway(&gateway)?;
    debug!("Reconciling ObservabilityGateway {}", key);

    let started = Instant::now();
    match ctx.reconciler.reconcile_and_publish(&key).await {
        Ok(report) => {
            ctx.metrics.record_success(&report, started.elapsed());
            ctx.reconciler.reset_backoff(&key);
            Ok(report.requeue_after.map_or_else(Action::await_change, Action::requeue))
        }
        Err(e) => {
            ctx.metrics.record_failure(&e, started.elapsed());
            Err(e)
        }
    }
}

/// Conflicts are retried after a short delay against fresh state; anything
/// else backs off per gateway along the Fibonacci sequence.
fn error_policy(gateway: Arc<ObservabilityGateway>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = GatewayKey::new(gateway.namespace().unwrap_or_default(), gateway.name_any());
    if error.is_conflict() {
        warn!("Conflict while reconciling {}, retrying in {:?}: {}", key, ctx.conflict_requeue, error);
        return Action::requeue(ctx.conflict_requeue);
    }
    error!("Reconciliation failed for {}: {}", key, error);
    Action::requeue(ctx.reconciler.next_backoff(&key))
}

/// Watches gateways and their children.
pub struct Watcher {
    context: Arc<Context>,
    gateway_api: Api<ObservabilityGateway>,
    deployment_api: Api<Deployment>,
    service_api: Api<Service>,
    runtime_config: RuntimeConfig,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        context: Arc<Context>,
        gateway_api: Api<ObservabilityGateway>,
        deployment_api: Api<Deployment>,
        service_api: Api<Service>,
        config: &ControllerConfig,
    ) -> Self {
        // Debounce batches bursts of child events (a rollout touches the
        // Deployment status many times) into one pass.
        let runtime_config = RuntimeConfig::default()
            .debounce(config.debounce)
            .concurrency(config.concurrency);
        Self {
            context,
            gateway_api,
            deployment_api,
            service_api,
            runtime_config,
        }
    }

    /// Runs until the controller stream ends (on SIGTERM/SIGINT).
    pub async fn watch_gateways(self) -> Result<(), ControllerError> {
        info!("Starting ObservabilityGateway watcher");

        let children = watcher::Config::default().labels(CLASS_LABEL);
        Controller::new(self.gateway_api, watcher::Config::default())
            .owns(self.deployment_api, children.clone())
            .owns(self.service_api, children)
            .with_config(self.runtime_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context)
            .for_each(|res| async move {
                match res {
                    Ok((obj, _action)) => debug!("Reconciled ObservabilityGateway {}", obj),
                    Err(e) => warn!("Controller error for ObservabilityGateway: {}", e),
                }
            })
            .await;

        info!("ObservabilityGateway watcher stopped");
        Ok(())
    }
}
