//! Service synchronizer
//!
//! Same identity and ownership scheme as the Deployment. Cluster-assigned
//! fields (`clusterIP`, `clusterIPs`, `ipFamilies`, session affinity
//! defaults) are never touched.

use crate::error::ControllerError;
use crate::reconcile_helpers::{merge_metadata, plan_apply, ApplyPlan, ChildKind, ChildOutcome};
use crate::reconciler::desired::CollectorSpec;
use crate::reconciler::Reconciler;
use k8s_openapi::api::core::v1::Service;
use tracing::{debug, info};

/// Folds the desired Service into a copy of the current one.
pub fn merge_service(current: &Service, desired: &Service) -> Result<Service, ControllerError> {
    let desired_spec = desired.spec.as_ref().ok_or_else(|| {
        ControllerError::Validation(format!(
            "desired Service {} has no spec",
            current.metadata.name.as_deref().unwrap_or_default()
        ))
    })?;

    let mut merged = current.clone();
    merge_metadata(&mut merged.metadata, &desired.metadata, ChildKind::Service)?;

    let spec = merged.spec.get_or_insert_with(Default::default);
    spec.selector = desired_spec.selector.clone();
    spec.ports = desired_spec.ports.clone();
    spec.type_ = desired_spec.type_.clone();

    Ok(merged)
}

impl Reconciler {
    /// Creates or updates the Service for one class.
    pub(crate) async fn sync_service(&self, spec: &CollectorSpec) -> Result<ChildOutcome, ControllerError> {
        let desired = spec.service();
        let current = self.store.get_service(&spec.namespace, &spec.name).await?;

        match plan_apply(current.as_ref(), &desired, merge_service)? {
            ApplyPlan::Create(service) => {
                self.store.create_service(&spec.namespace, &service).await?;
                info!("Created Service {}/{} (class {})", spec.namespace, spec.name, spec.class_name);
                Ok(ChildOutcome::Created)
            }
            ApplyPlan::Update(service) => {
                self.store.replace_service(&spec.namespace, &service).await?;
                info!("Updated Service {}/{} (class {})", spec.namespace, spec.name, spec.class_name);
                Ok(ChildOutcome::Updated)
            }
            ApplyPlan::Unchanged => {
                debug!("Service {}/{} is up to date", spec.namespace, spec.name);
                Ok(ChildOutcome::Unchanged)
            }
        }
    }
}
