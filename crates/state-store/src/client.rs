//! Kubernetes-backed state store
//!
//! Implements `StateStore` on top of `kube::Api`. Namespaced APIs are built
//! per call so one store serves gateways in any namespace.

use crate::error::StoreError;
use crate::store_trait::StateStore;
use crds::{ObservabilityGateway, ObservabilityGatewayStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Field manager recorded on every write made by the controller
pub const FIELD_MANAGER: &str = "observability-gateway-controller";

/// State store backed by a live Kubernetes API server.
#[derive(Clone)]
pub struct KubeStateStore {
    client: Client,
}

impl Debug for KubeStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStateStore").finish_non_exhaustive()
    }
}

impl KubeStateStore {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the in-cluster or kubeconfig environment.
    pub async fn try_default() -> Result<Self, StoreError> {
        let client = Client::try_default().await.map_err(StoreError::from_kube)?;
        Ok(Self::new(client))
    }

    /// The underlying client, for watchers that need raw `Api` handles.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        debug!("GET {}/{}", namespace, name);
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn list<K>(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        debug!("LIST {} labels={}", namespace, label_selector);
        let lp = ListParams::default().labels(label_selector);
        let list = self.api::<K>(namespace)
            .list(&lp)
            .await
            .map_err(StoreError::from_kube)?;
        Ok(list.items)
    }

    async fn create<K>(&self, namespace: &str, obj: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        debug!("CREATE {}/{:?}", namespace, obj.meta().name);
        self.api::<K>(namespace)
            .create(&Self::post_params(), obj)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn replace<K>(&self, namespace: &str, obj: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let name = obj.meta().name.as_deref()
            .ok_or_else(|| StoreError::Invalid("object is missing metadata.name".to_string()))?;
        if obj.meta().resource_version.is_none() {
            // Without a resourceVersion the API server would accept a blind overwrite.
            return Err(StoreError::Invalid(format!("{} is missing metadata.resourceVersion", name)));
        }
        debug!("REPLACE {}/{} rv={:?}", namespace, name, obj.meta().resource_version);
        self.api::<K>(namespace)
            .replace(name, &Self::post_params(), obj)
            .await
            .map_err(StoreError::from_kube)
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        debug!("DELETE {}/{}", namespace, name);
        match self.api::<K>(namespace).delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) => match StoreError::from_kube(e) {
                StoreError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}

#[async_trait::async_trait]
impl StateStore for KubeStateStore {
    async fn get_gateway(&self, namespace: &str, name: &str) -> Result<Option<ObservabilityGateway>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn patch_gateway_status(&self, namespace: &str, name: &str, status: &ObservabilityGatewayStatus) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "status": status });
        let pp = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<ObservabilityGateway>(namespace)
            .patch_status(name, &pp, &Patch::Merge(&patch))
            .await
            .map_err(StoreError::from_kube)?;
        Ok(())
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn list_deployments(&self, namespace: &str, label_selector: &str) -> Result<Vec<Deployment>, StoreError> {
        self.list(namespace, label_selector).await
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError> {
        self.create(namespace, deployment).await
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, StoreError> {
        self.replace(namespace, deployment).await
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<Deployment>(namespace, name).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        self.get_opt(namespace, name).await
    }

    async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>, StoreError> {
        self.list(namespace, label_selector).await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, StoreError> {
        self.create(namespace, service).await
    }

    async fn replace_service(&self, namespace: &str, service: &Service) -> Result<Service, StoreError> {
        self.replace(namespace, service).await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete::<Service>(namespace, name).await
    }
}
