//! StateStore trait for mocking
//!
//! This trait abstracts the Kubernetes API so the reconciler can be unit
//! tested against an in-memory store. `KubeStateStore` implements it for a
//! live cluster, `MockStateStore` (feature `test-util`) for tests.

use crate::error::StoreError;
use crds::{ObservabilityGateway, ObservabilityGatewayStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;

/// Operations the reconciler needs from the declarative state store.
///
/// Semantics every implementation must honour:
/// - `get_*` return `Ok(None)` for a missing object.
/// - `replace_*` carry the object's `resourceVersion`; a stale version fails
///   with `StoreError::Conflict`.
/// - `delete_*` of a missing object is `Ok(())`.
/// - `list_*` take a label selector in `k=v,k2=v2` form.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    // Parent resource
    async fn get_gateway(&self, namespace: &str, name: &str) -> Result<Option<ObservabilityGateway>, StoreError>;
    async fn patch_gateway_status(&self, namespace: &str, name: &str, status: &ObservabilityGatewayStatus) -> Result<(), StoreError>;

    // Compute children
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, StoreError>;
    async fn list_deployments(&self, namespace: &str, label_selector: &str) -> Result<Vec<Deployment>, StoreError>;
    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError>;
    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // Network children
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError>;
    async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>, StoreError>;
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, StoreError>;
    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service, StoreError>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}
