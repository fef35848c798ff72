//! Service operations for MockStateStore

use super::objects;
use super::{MockStateStore, StoreOperation};
use crate::error::StoreError;
use k8s_openapi::api::core::v1::Service;

pub fn get_service(store: &MockStateStore, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
    store.check_failure(StoreOperation::GetService, name)?;
    Ok(objects::get(&store.services, namespace, name))
}

pub fn list_services(store: &MockStateStore, namespace: &str, label_selector: &str) -> Result<Vec<Service>, StoreError> {
    store.check_failure(StoreOperation::ListServices, label_selector)?;
    Ok(objects::list(&store.services, namespace, label_selector))
}

pub fn create_service(store: &MockStateStore, namespace: &str, service: &Service) -> Result<Service, StoreError> {
    let name = objects::object_name(service)?;
    store.check_failure(StoreOperation::CreateService, &name)?;

    // The API server allocates a cluster IP for ClusterIP services
    let mut service = service.clone();
    if let Some(spec) = service.spec.as_mut() {
        if spec.cluster_ip.is_none() {
            let octet = store.next_revision().parse::<u64>().unwrap_or(0) % 250 + 1;
            let ip = format!("10.96.0.{}", octet);
            spec.cluster_ip = Some(ip.clone());
            spec.cluster_ips = Some(vec![ip]);
        }
    }

    let created = objects::create(store, &store.services, namespace, &service)?;
    store.record_child_write();
    Ok(created)
}

pub fn replace_service(store: &MockStateStore, namespace: &str, service: &Service) -> Result<Service, StoreError> {
    let name = objects::object_name(service)?;
    store.check_failure(StoreOperation::ReplaceService, &name)?;
    let replaced = objects::replace(store, &store.services, namespace, service, |existing, incoming| {
        let current = existing.spec.as_ref().and_then(|s| s.cluster_ip.as_ref());
        let requested = incoming.spec.as_ref().and_then(|s| s.cluster_ip.as_ref());
        if current != requested {
            return Err(StoreError::Invalid(format!(
                "Service \"{}\" is invalid: spec.clusterIP: field is immutable",
                name
            )));
        }
        Ok(())
    })?;
    store.record_child_write();
    Ok(replaced)
}

pub fn delete_service(store: &MockStateStore, namespace: &str, name: &str) -> Result<(), StoreError> {
    store.check_failure(StoreOperation::DeleteService, name)?;
    if store.take_vanishing(StoreOperation::DeleteService, name) {
        objects::delete(&store.services, namespace, name);
    }
    if objects::delete(&store.services, namespace, name) {
        store.record_child_write();
    }
    Ok(())
}

impl MockStateStore {
    /// Insert a Service as-is, bypassing create semantics (for test setup).
    pub fn insert_service(&self, namespace: &str, service: Service) -> Result<Service, StoreError> {
        objects::create(self, &self.services, namespace, &service)
    }

    /// Current copy of a Service (for assertions).
    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        objects::get(&self.services, namespace, name)
    }

    /// Names of all Services in a namespace, sorted.
    pub fn service_names(&self, namespace: &str) -> Vec<String> {
        objects::list(&self.services, namespace, "")
            .into_iter()
            .filter_map(|s| s.metadata.name)
            .collect()
    }
}
