//! Mock StateStore for unit testing
//!
//! This module provides an in-memory implementation of `StateStore` that can
//! be used in unit tests without a running API server. It models the parts
//! of API server behaviour the reconciler relies on:
//! - `resourceVersion` based optimistic concurrency on replace
//! - immutable Deployment selectors
//! - garbage collection of owned children when a gateway is deleted
//!
//! The mock is organized into modules:
//! - `objects.rs` - generic keyed object storage shared by every kind
//! - `gateways.rs` - parent resource operations and cascade delete
//! - `workloads.rs` - Deployment operations
//! - `network.rs` - Service operations
//! - `helpers.rs` - label selector matching and lock handling

mod gateways;
mod helpers;
mod network;
mod objects;
mod workloads;

use crate::error::StoreError;
use crate::store_trait::StateStore;
use crds::{ObservabilityGateway, ObservabilityGatewayStatus};
use helpers::lock;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use objects::Objects;
use std::sync::{Arc, Mutex};

/// Store operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    GetGateway,
    PatchGatewayStatus,
    GetDeployment,
    ListDeployments,
    CreateDeployment,
    ReplaceDeployment,
    DeleteDeployment,
    GetService,
    ListServices,
    CreateService,
    ReplaceService,
    DeleteService,
}

/// Kind of error an injected failure produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Conflict,
    Unavailable,
    Invalid,
}

impl FailureKind {
    fn into_error(self, op: StoreOperation, name: &str) -> StoreError {
        let message = format!("injected failure on {:?} {}", op, name);
        match self {
            Self::Conflict => StoreError::Conflict(message),
            Self::Unavailable => StoreError::Unavailable(message),
            Self::Invalid => StoreError::Invalid(message),
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: StoreOperation,
    name: Option<String>,
    kind: FailureKind,
}

/// Mock StateStore for testing
///
/// Cloning is cheap and every clone shares the same storage, so a test can
/// hand one clone to the reconciler and inspect another.
#[derive(Clone, Default, Debug)]
pub struct MockStateStore {
    pub(crate) gateways: Objects<ObservabilityGateway>,
    pub(crate) deployments: Objects<Deployment>,
    pub(crate) services: Objects<Service>,
    // Monotonic counter shared by every kind, like etcd revisions
    pub(crate) revision: Arc<Mutex<u64>>,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
    // (operation, object name) pairs whose target vanishes right before the call
    vanishing: Arc<Mutex<Vec<(StoreOperation, String)>>>,
    child_writes: Arc<Mutex<u64>>,
    status_patches: Arc<Mutex<u64>>,
}

impl MockStateStore {
    /// Create a new, empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` (optionally only for object `name`) fail once with `kind`.
    pub fn fail_next(&self, op: StoreOperation, name: Option<&str>, kind: FailureKind) {
        lock(&self.failures).push(InjectedFailure {
            op,
            name: name.map(str::to_string),
            kind,
        });
    }

    /// Make object `name` disappear just before the next `op` on it, as if
    /// another client deleted it concurrently.
    pub fn vanish_before(&self, op: StoreOperation, name: &str) {
        lock(&self.vanishing).push((op, name.to_string()));
    }

    /// Number of successful create/replace/delete calls on child objects
    pub fn child_writes(&self) -> u64 {
        *lock(&self.child_writes)
    }

    /// Number of successful status patches on gateways
    pub fn status_patches(&self) -> u64 {
        *lock(&self.status_patches)
    }

    /// Consumes a matching injected failure, if any.
    pub(crate) fn check_failure(&self, op: StoreOperation, name: &str) -> Result<(), StoreError> {
        let mut failures = lock(&self.failures);
        let position = failures.iter().position(|f| {
            f.op == op && f.name.as_deref().is_none_or(|n| n == name)
        });
        match position {
            Some(index) => {
                let failure = failures.remove(index);
                Err(failure.kind.into_error(op, name))
            }
            None => Ok(()),
        }
    }

    /// Consumes a matching `vanish_before` entry, if any.
    pub(crate) fn take_vanishing(&self, op: StoreOperation, name: &str) -> bool {
        let mut vanishing = lock(&self.vanishing);
        match vanishing.iter().position(|(o, n)| *o == op && n == name) {
            Some(index) => {
                vanishing.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn next_revision(&self) -> String {
        let mut revision = lock(&self.revision);
        *revision += 1;
        revision.to_string()
    }

    pub(crate) fn record_child_write(&self) {
        *lock(&self.child_writes) += 1;
    }

    pub(crate) fn record_status_patch(&self) {
        *lock(&self.status_patches) += 1;
    }
}

#[async_trait::async_trait]
impl StateStore for MockStateStore {
    async fn get_gateway(&self, namespace: &str, name: &str) -> Result<Option<ObservabilityGateway>, StoreError> {
        gateways::get_gateway(self, namespace, name)
    }

    async fn patch_gateway_status(&self, namespace: &str, name: &str, status: &ObservabilityGatewayStatus) -> Result<(), StoreError> {
        gateways::patch_gateway_status(self, namespace, name, status)
    }

    // Deployments - delegated to workloads module
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, StoreError> {
        workloads::get_deployment(self, namespace, name)
    }

    async fn list_deployments(&self, namespace: &str, label_selector: &str) -> Result<Vec<Deployment>, StoreError> {
        workloads::list_deployments(self, namespace, label_selector)
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError> {
        workloads::create_deployment(self, namespace, deployment)
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError> {
        workloads::replace_deployment(self, namespace, deployment)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        workloads::delete_deployment(self, namespace, name)
    }

    // Services - delegated to network module
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        network::get_service(self, namespace, name)
    }

    async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>, StoreError> {
        network::list_services(self, namespace, label_selector)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, StoreError> {
        network::create_service(self, namespace, service)
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service, StoreError> {
        network::replace_service(self, namespace, service)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        network::delete_service(self, namespace, name)
    }
}
