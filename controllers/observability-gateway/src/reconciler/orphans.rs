//! Orphan collection
//!
//! Removes children left behind when a class is renamed or dropped from the
//! gateway spec. The garbage collector only acts when the gateway itself is
//! deleted, so this is the sole path for per-class cleanup.

use crate::error::ControllerError;
use crate::reconcile_helpers::{controller_uid, ChildKind};
use crate::reconciler::desired::{owned_selector, CLASS_LABEL};
use crate::reconciler::{GatewayKey, Reconciler};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// True if `meta` is labeled for none of `classes` and no other object controls it.
///
/// Candidates come from the gateway's part-of label, so children that lost
/// their owner reference are still collected. Only a controller reference to
/// a different uid protects an object.
pub fn is_orphan(meta: &ObjectMeta, owner_uid: &str, classes: &BTreeSet<&str>) -> bool {
    if controller_uid(meta).is_some_and(|uid| uid != owner_uid) {
        return false;
    }
    let class = meta.labels.as_ref().and_then(|labels| labels.get(CLASS_LABEL));
    class.is_none_or(|c| !classes.contains(c.as_str()))
}

impl Reconciler {
    /// Deletes every Deployment and Service of `key` whose class is no longer declared.
    ///
    /// Returns `(kind, name)` for each deleted child.
    pub(crate) async fn collect_orphans(
        &self,
        key: &GatewayKey,
        owner_uid: &str,
        classes: &BTreeSet<&str>,
    ) -> Result<Vec<(ChildKind, String)>, ControllerError> {
        let selector = owned_selector(&key.name);
        let mut deleted = Vec::new();

        let deployments = self.store.list_deployments(&key.namespace, &selector).await?;
        for name in deployments.iter()
            .filter(|d| is_orphan(&d.metadata, owner_uid, classes))
            .filter_map(|d| d.metadata.name.clone())
        {
            self.store.delete_deployment(&key.namespace, &name).await?;
            info!("Deleted orphaned Deployment {}/{}", key.namespace, name);
            deleted.push((ChildKind::Deployment, name));
        }

        let services = self.store.list_services(&key.namespace, &selector).await?;
        for name in services.iter()
            .filter(|s| is_orphan(&s.metadata, owner_uid, classes))
            .filter_map(|s| s.metadata.name.clone())
        {
            self.store.delete_service(&key.namespace, &name).await?;
            info!("Deleted orphaned Service {}/{}", key.namespace, name);
            deleted.push((ChildKind::Service, name));
        }

        if deleted.is_empty() {
            debug!("No orphaned children for {}", key);
        }
        Ok(deleted)
    }
}
