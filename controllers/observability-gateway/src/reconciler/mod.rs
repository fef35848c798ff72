//! Reconciliation logic for ObservabilityGateway resources.
//!
//! A pass converges the children of one gateway onto its spec:
//! - `desired`: pure derivation of each class's Deployment and Service
//! - `deployment` / `service`: per-child synchronizers
//! - `orphans`: removal of children whose class is gone
//! - `quantity`: canonical resource quantities for drift-free comparison
//! - `status`: the Ready condition, published after the pass
//!
//! Every pass recomputes the full desired state from the stored gateway; no
//! state carries over between passes except the per-key retry backoff.

pub mod deployment;
pub mod desired;
pub mod orphans;
pub mod quantity;
pub mod service;
pub mod status;

#[cfg(test)]
mod deployment_test;
#[cfg(test)]
mod desired_test;

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::reconcile_helpers::{ChildKind, ChildOutcome};
use crds::ObservabilityGateway;
use desired::CollectorSpec;
use kube::ResourceExt;
use state_store::StateStore;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identity of a gateway: the only input a pass needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GatewayKey {
    pub namespace: String,
    pub name: String,
}

impl GatewayKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_gateway(gateway: &ObservabilityGateway) -> Result<Self, ControllerError> {
        let namespace = gateway.namespace().ok_or_else(|| {
            ControllerError::Validation(format!("ObservabilityGateway {} has no namespace", gateway.name_any()))
        })?;
        Ok(Self::new(namespace, gateway.name_any()))
    }
}

impl fmt::Display for GatewayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One child touched by a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReport {
    pub kind: ChildKind,
    pub name: String,
    pub outcome: ChildOutcome,
}

/// What a pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub key: GatewayKey,
    /// False when the gateway no longer exists
    pub found: bool,
    /// Number of classes in the applied `spec.classes`
    pub classes: usize,
    pub children: Vec<ChildReport>,
    pub orphans_deleted: Vec<(ChildKind, String)>,
    /// Resync hint for the scheduler
    pub requeue_after: Option<Duration>,
}

impl ReconcileReport {
    fn new(key: GatewayKey) -> Self {
        Self {
            key,
            found: false,
            classes: 0,
            children: Vec::new(),
            orphans_deleted: Vec::new(),
            requeue_after: None,
        }
    }

    fn record(&mut self, kind: ChildKind, name: &str, outcome: ChildOutcome) {
        self.children.push(ChildReport {
            kind,
            name: name.to_string(),
            outcome,
        });
    }

    /// Outcome of the named child, if the pass touched it.
    pub fn outcome(&self, kind: ChildKind, name: &str) -> Option<ChildOutcome> {
        self.children.iter()
            .find(|c| c.kind == kind && c.name == name)
            .map(|c| c.outcome)
    }

    /// True if the pass wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.orphans_deleted.is_empty()
            && self.children.iter().all(|c| c.outcome == ChildOutcome::Unchanged)
    }

    pub fn summary(&self) -> String {
        let count = |outcome| self.children.iter().filter(|c| c.outcome == outcome).count();
        format!(
            "{} classes, {} created, {} updated, {} unchanged, {} orphans deleted",
            self.classes,
            count(ChildOutcome::Created),
            count(ChildOutcome::Updated),
            count(ChildOutcome::Unchanged),
            self.orphans_deleted.len()
        )
    }
}

/// Backoff state for a gateway
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_minutes, max_minutes),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Reconciles ObservabilityGateway resources against a state store.
pub struct Reconciler {
    pub(crate) store: Box<dyn StateStore + Send + Sync>,
    resync_interval: Option<Duration>,
    backoff_min_minutes: u64,
    backoff_max_minutes: u64,
    /// Error count tracking per gateway (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<GatewayKey, BackoffState>>>,
}

impl Reconciler {
    /// Creates a new reconciler with the default 1m..10m failure backoff.
    pub fn new(store: impl StateStore + 'static, resync_interval: Option<Duration>) -> Self {
        Self {
            store: Box::new(store),
            resync_interval,
            backoff_min_minutes: 1,
            backoff_max_minutes: 10,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Overrides the failure backoff bounds (minutes).
    pub fn with_backoff(mut self, min_minutes: u64, max_minutes: u64) -> Self {
        self.backoff_min_minutes = min_minutes;
        self.backoff_max_minutes = max_minutes;
        self
    }

    /// Runs one pass for `key`.
    ///
    /// A missing gateway is a successful no-op. The first error aborts the
    /// pass; children already written stay as written.
    pub async fn reconcile(&self, key: &GatewayKey) -> Result<ReconcileReport, ControllerError> {
        let mut report = ReconcileReport::new(key.clone());

        let Some(gateway) = self.store.get_gateway(&key.namespace, &key.name).await? else {
            debug!("ObservabilityGateway {} not found, nothing to do", key);
            return Ok(report);
        };
        report.found = true;

        if gateway.metadata.deletion_timestamp.is_some() {
            debug!("ObservabilityGateway {} is being deleted, leaving children to the garbage collector", key);
            return Ok(report);
        }

        let owner_uid = gateway.metadata.uid.clone()
            .ok_or_else(|| ControllerError::Validation(format!("ObservabilityGateway {} has no uid", key)))?;
        check_unique_classes(key, &gateway)?;

        for class in &gateway.spec.classes {
            let spec = CollectorSpec::extract(&gateway, class)?;
            let outcome = self.sync_deployment(&spec).await?;
            report.record(ChildKind::Deployment, &spec.name, outcome);
            let outcome = self.sync_service(&spec).await?;
            report.record(ChildKind::Service, &spec.name, outcome);
        }
        report.classes = gateway.spec.classes.len();

        let classes = gateway.spec.class_names();
        report.orphans_deleted = self.collect_orphans(key, &owner_uid, &classes).await?;
        report.requeue_after = self.resync_interval;

        if report.is_noop() {
            debug!("Reconciled {}: {}", key, report.summary());
        } else {
            info!("Reconciled {}: {}", key, report.summary());
        }
        Ok(report)
    }

    /// Runs a pass and records its outcome on the gateway's Ready condition.
    pub async fn reconcile_and_publish(&self, key: &GatewayKey) -> Result<ReconcileReport, ControllerError> {
        let result = self.reconcile(key).await;
        match &result {
            Ok(report) if report.found => self.publish_status(key, Ok(report)).await,
            Ok(_) => {}
            Err(e) => self.publish_status(key, Err(e)).await,
        }
        result
    }

    /// Next retry delay for a failing gateway; advances its backoff.
    pub fn next_backoff(&self, key: &GatewayKey) -> Duration {
        let mut states = match self.backoff_states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = states.entry(key.clone())
            .or_insert_with(|| BackoffState::new(self.backoff_min_minutes, self.backoff_max_minutes));
        state.increment_error();
        let delay = state.backoff.next_backoff();
        warn!("{} failed {} time(s) in a row, retrying in {:?}", key, state.error_count, delay);
        delay
    }

    /// Forgets the failure history of `key` after a successful pass.
    pub fn reset_backoff(&self, key: &GatewayKey) {
        let mut states = match self.backoff_states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if states.remove(key).is_some() {
            debug!("Reset backoff for {}", key);
        }
    }
}

/// Rejects specs declaring the same class name twice; both would map to one child.
fn check_unique_classes(key: &GatewayKey, gateway: &ObservabilityGateway) -> Result<(), ControllerError> {
    let mut seen = BTreeSet::new();
    for class in &gateway.spec.classes {
        if !seen.insert(class.name.as_str()) {
            return Err(ControllerError::Validation(format!(
                "{}: class {:?} is declared more than once",
                key, class.name
            )));
        }
    }
    Ok(())
}
