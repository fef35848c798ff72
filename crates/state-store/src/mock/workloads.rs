//! Deployment operations for MockStateStore

use super::objects;
use super::{MockStateStore, StoreOperation};
use crate::error::StoreError;
use k8s_openapi::api::apps::v1::Deployment;

pub fn get_deployment(store: &MockStateStore, namespace: &str, name: &str) -> Result<Option<Deployment>, StoreError> {
    store.check_failure(StoreOperation::GetDeployment, name)?;
    Ok(objects::get(&store.deployments, namespace, name))
}

pub fn list_deployments(store: &MockStateStore, namespace: &str, label_selector: &str) -> Result<Vec<Deployment>, StoreError> {
    store.check_failure(StoreOperation::ListDeployments, label_selector)?;
    Ok(objects::list(&store.deployments, namespace, label_selector))
}

pub fn create_deployment(store: &MockStateStore, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError> {
    let name = objects::object_name(deployment)?;
    store.check_failure(StoreOperation::CreateDeployment, &name)?;
    let created = objects::create(store, &store.deployments, namespace, deployment)?;
    store.record_child_write();
    Ok(created)
}

pub fn replace_deployment(store: &MockStateStore, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError> {
    let name = objects::object_name(deployment)?;
    store.check_failure(StoreOperation::ReplaceDeployment, &name)?;
    let replaced = objects::replace(store, &store.deployments, namespace, deployment, |existing, incoming| {
        // apps/v1 rejects any change to spec.selector
        let current = existing.spec.as_ref().map(|s| &s.selector);
        let requested = incoming.spec.as_ref().map(|s| &s.selector);
        if current != requested {
            return Err(StoreError::Invalid(format!(
                "Deployment.apps \"{}\" is invalid: spec.selector: field is immutable",
                name
            )));
        }
        Ok(())
    })?;
    store.record_child_write();
    Ok(replaced)
}

pub fn delete_deployment(store: &MockStateStore, namespace: &str, name: &str) -> Result<(), StoreError> {
    store.check_failure(StoreOperation::DeleteDeployment, name)?;
    if store.take_vanishing(StoreOperation::DeleteDeployment, name) {
        objects::delete(&store.deployments, namespace, name);
    }
    if objects::delete(&store.deployments, namespace, name) {
        store.record_child_write();
    }
    Ok(())
}

impl MockStateStore {
    /// Insert a Deployment as-is, bypassing create semantics (for test setup).
    pub fn insert_deployment(&self, namespace: &str, deployment: Deployment) -> Result<Deployment, StoreError> {
        objects::create(self, &self.deployments, namespace, &deployment)
    }

    /// Current copy of a Deployment (for assertions).
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        objects::get(&self.deployments, namespace, name)
    }

    /// Names of all Deployments in a namespace, sorted.
    pub fn deployment_names(&self, namespace: &str) -> Vec<String> {
        objects::list(&self.deployments, namespace, "")
            .into_iter()
            .filter_map(|d| d.metadata.name)
            .collect()
    }
}
