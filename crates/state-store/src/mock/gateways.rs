//! Gateway operations for MockStateStore
//!
//! Besides the trait operations this holds the test setup helpers that stand
//! in for a user editing or deleting the parent resource.

use super::helpers::lock;
use super::objects::{self, key};
use super::{MockStateStore, StoreOperation};
use crate::error::StoreError;
use crds::{ObservabilityGateway, ObservabilityGatewaySpec, ObservabilityGatewayStatus};

pub fn get_gateway(store: &MockStateStore, namespace: &str, name: &str) -> Result<Option<ObservabilityGateway>, StoreError> {
    store.check_failure(StoreOperation::GetGateway, name)?;
    Ok(objects::get(&store.gateways, namespace, name))
}

pub fn patch_gateway_status(
    store: &MockStateStore,
    namespace: &str,
    name: &str,
    status: &ObservabilityGatewayStatus,
) -> Result<(), StoreError> {
    store.check_failure(StoreOperation::PatchGatewayStatus, name)?;
    let mut gateways = lock(&store.gateways);
    let gateway = gateways.get_mut(&key(namespace, name))
        .ok_or_else(|| StoreError::NotFound(format!("ObservabilityGateway {}/{}", namespace, name)))?;
    gateway.status = Some(status.clone());
    // Status writes never bump generation
    gateway.metadata.resource_version = Some(store.next_revision());
    drop(gateways);
    store.record_status_patch();
    Ok(())
}

impl MockStateStore {
    /// Add a gateway to the mock store (for test setup).
    ///
    /// Returns the stored copy with uid, resourceVersion and generation set.
    pub fn add_gateway(&self, gateway: ObservabilityGateway) -> ObservabilityGateway {
        let namespace = gateway.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = gateway.metadata.name.clone().unwrap_or_default();

        let mut stored = gateway;
        stored.metadata.namespace = Some(namespace.clone());
        stored.metadata.uid.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
        stored.metadata.generation = Some(1);
        stored.metadata.resource_version = Some(self.next_revision());

        lock(&self.gateways).insert(key(&namespace, &name), stored.clone());
        stored
    }

    /// Replace a gateway's spec, as a user edit would, bumping its generation.
    pub fn update_gateway_spec(&self, namespace: &str, name: &str, spec: ObservabilityGatewaySpec) -> Result<ObservabilityGateway, StoreError> {
        let mut gateways = lock(&self.gateways);
        let gateway = gateways.get_mut(&key(namespace, name))
            .ok_or_else(|| StoreError::NotFound(format!("ObservabilityGateway {}/{}", namespace, name)))?;
        gateway.spec = spec;
        gateway.metadata.generation = Some(gateway.metadata.generation.unwrap_or(0) + 1);
        gateway.metadata.resource_version = Some(self.next_revision());
        Ok(gateway.clone())
    }

    /// Delete a gateway and garbage-collect every object it owns, the way the
    /// API server's garbage collector follows owner references.
    ///
    /// Returns the names of the collected children.
    pub fn delete_gateway(&self, namespace: &str, name: &str) -> Vec<String> {
        let removed = lock(&self.gateways).remove(&key(namespace, name));
        let Some(uid) = removed.and_then(|gw| gw.metadata.uid) else {
            return Vec::new();
        };

        let mut collected = objects::collect_garbage(&self.deployments, &uid);
        collected.extend(objects::collect_garbage(&self.services, &uid));
        collected
    }

    /// Current copy of a gateway (for assertions).
    pub fn gateway(&self, namespace: &str, name: &str) -> Option<ObservabilityGateway> {
        objects::get(&self.gateways, namespace, name)
    }
}
