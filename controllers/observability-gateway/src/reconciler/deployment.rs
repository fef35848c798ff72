//! Deployment synchronizer
//!
//! Ensures the collector Deployment for one class exists and matches the
//! desired spec. Only the fields the controller manages are overwritten;
//! everything the API server or other tools filled in is left alone.

use crate::error::ControllerError;
use crate::reconcile_helpers::{merge_metadata, plan_apply, ApplyPlan, ChildKind, ChildOutcome};
use crate::reconciler::desired::{CollectorSpec, CONTAINER_NAME};
use crate::reconciler::Reconciler;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, PodSpec, Volume};
use tracing::{debug, info};

/// Folds the desired Deployment into a copy of the current one.
///
/// Fails with `ImmutableField` if the stored selector differs from the
/// desired one; the API server would reject the change anyway.
pub fn merge_deployment(current: &Deployment, desired: &Deployment) -> Result<Deployment, ControllerError> {
    let name = current.metadata.name.clone().unwrap_or_default();
    let desired_spec = desired.spec.as_ref()
        .ok_or_else(|| ControllerError::Validation(format!("desired Deployment {} has no spec", name)))?;

    let mut merged = current.clone();
    merge_metadata(&mut merged.metadata, &desired.metadata, ChildKind::Deployment)?;

    let spec = merged.spec.get_or_insert_with(|| desired_spec.clone());
    if spec.selector != desired_spec.selector {
        return Err(ControllerError::ImmutableField {
            kind: ChildKind::Deployment.as_str(),
            name,
            field: "spec.selector",
        });
    }
    spec.replicas = desired_spec.replicas;

    let desired_template = &desired_spec.template;
    let template_meta = spec.template.metadata.get_or_insert_with(Default::default);
    if let Some(desired_meta) = &desired_template.metadata {
        if let Some(desired_labels) = &desired_meta.labels {
            let labels = template_meta.labels.get_or_insert_with(Default::default);
            for (key, value) in desired_labels {
                labels.insert(key.clone(), value.clone());
            }
        }
        template_meta.annotations = desired_meta.annotations.clone();
    }

    if let Some(desired_pod) = &desired_template.spec {
        let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
        for container in &desired_pod.containers {
            upsert_container(&mut pod.containers, container);
        }
        for volume in desired_pod.volumes.iter().flatten() {
            upsert_volume(pod.volumes.get_or_insert_with(Vec::new), volume);
        }
        pod.node_selector = desired_pod.node_selector.clone();
        pod.tolerations = desired_pod.tolerations.clone();
        pod.affinity = desired_pod.affinity.clone();
    }

    Ok(merged)
}

fn upsert_container(containers: &mut Vec<Container>, desired: &Container) {
    match containers.iter_mut().find(|c| c.name == desired.name) {
        Some(existing) => {
            existing.image = desired.image.clone();
            existing.args = desired.args.clone();
            existing.ports = desired.ports.clone();
            existing.volume_mounts = desired.volume_mounts.clone();
            existing.resources = desired.resources.clone();
        }
        None => containers.push(desired.clone()),
    }
}

fn upsert_volume(volumes: &mut Vec<Volume>, desired: &Volume) {
    match volumes.iter_mut().find(|v| v.name == desired.name) {
        Some(existing) => *existing = desired.clone(),
        None => volumes.push(desired.clone()),
    }
}

impl Reconciler {
    /// Creates or updates the Deployment for one class.
    pub(crate) async fn sync_deployment(&self, spec: &CollectorSpec) -> Result<ChildOutcome, ControllerError> {
        let desired = spec.deployment();
        let current = self.store.get_deployment(&spec.namespace, &spec.name).await?;

        match plan_apply(current.as_ref(), &desired, merge_deployment)? {
            ApplyPlan::Create(deployment) => {
                self.store.create_deployment(&spec.namespace, &deployment).await?;
                info!(
                    "Created Deployment {}/{} (class {}, replicas {}, container {})",
                    spec.namespace, spec.name, spec.class_name, spec.replicas, CONTAINER_NAME
                );
                Ok(ChildOutcome::Created)
            }
            ApplyPlan::Update(deployment) => {
                self.store.replace_deployment(&spec.namespace, &deployment).await?;
                info!("Updated Deployment {}/{} (class {})", spec.namespace, spec.name, spec.class_name);
                Ok(ChildOutcome::Updated)
            }
            ApplyPlan::Unchanged => {
                debug!("Deployment {}/{} is up to date", spec.namespace, spec.name);
                Ok(ChildOutcome::Unchanged)
            }
        }
    }
}
