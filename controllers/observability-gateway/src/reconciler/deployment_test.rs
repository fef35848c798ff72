//! Unit tests for the Deployment synchronizer

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconcile_helpers::{plan_apply, ApplyPlan, ChildOutcome};
    use crate::reconciler::deployment::merge_deployment;
    use crate::reconciler::desired::{CollectorSpec, CONTAINER_NAME};
    use crate::test_utils::*;
    use k8s_openapi::api::apps::v1::Deployment;
    use crds::GatewayClass;
    use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use state_store::{FailureKind, MockStateStore, StoreOperation};
    use std::collections::BTreeMap;

    fn collector(class: &str) -> CollectorSpec {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        CollectorSpec::extract(&gateway, &test_class(class)).unwrap()
    }

    fn collector_for(class: &GatewayClass) -> CollectorSpec {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        CollectorSpec::extract(&gateway, class).unwrap()
    }

    fn quantities(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, Quantity>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), Quantity(v.to_string()))).collect())
    }

    /// The desired Deployment as the API server would return it: server
    /// metadata stamped and a few defaulted fields filled in.
    fn stored(desired: &Deployment) -> Deployment {
        let mut current = desired.clone();
        current.metadata.resource_version = Some("42".to_string());
        current.metadata.uid = Some("deploy-uid".to_string());
        let pod = current.spec.as_mut().unwrap().template.spec.as_mut().unwrap();
        pod.restart_policy = Some("Always".to_string());
        pod.containers[0].image_pull_policy = Some("IfNotPresent".to_string());
        pod.containers[0].termination_message_path = Some("/dev/termination-log".to_string());
        current
    }

    #[test]
    fn test_merge_of_stored_desired_is_noop() {
        let desired = collector("a").deployment();
        let current = stored(&desired);

        let plan = plan_apply(Some(&current), &desired, merge_deployment).unwrap();

        assert_eq!(plan, ApplyPlan::Unchanged);
    }

    #[test]
    fn test_replica_change_keeps_selector_and_server_fields() {
        let current = stored(&collector("a").deployment());
        let mut spec = collector("a");
        spec.replicas = 5;
        let desired = spec.deployment();

        let ApplyPlan::Update(merged) = plan_apply(Some(&current), &desired, merge_deployment).unwrap() else {
            panic!("expected an update");
        };

        let merged_spec = merged.spec.as_ref().unwrap();
        assert_eq!(merged_spec.replicas, Some(5));
        assert_eq!(merged_spec.selector, current.spec.as_ref().unwrap().selector);
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("42"));
        let pod = merged_spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("Always"));
        assert_eq!(pod.containers[0].image_pull_policy.as_deref(), Some("IfNotPresent"));
    }

    #[test]
    fn test_merge_upserts_managed_container_and_keeps_sidecars() {
        let mut current = stored(&collector("a").deployment());
        let pod = current.spec.as_mut().unwrap().template.spec.as_mut().unwrap();
        pod.containers[0].image = Some("otel/collector:old".to_string());
        pod.containers.push(Container {
            name: "istio-proxy".to_string(),
            image: Some("istio/proxyv2".to_string()),
            ..Default::default()
        });

        let desired = collector("a").deployment();
        let merged = merge_deployment(&current, &desired).unwrap();

        let containers = merged.spec.unwrap().template.spec.unwrap().containers;
        assert_eq!(containers.len(), 2);
        let collector = containers.iter().find(|c| c.name == CONTAINER_NAME).unwrap();
        assert_eq!(collector.image.as_deref(), Some(TEST_IMAGE));
        assert!(containers.iter().any(|c| c.name == "istio-proxy"));
    }

    #[test]
    fn test_selector_change_is_immutable_field() {
        let mut current = stored(&collector("a").deployment());
        current.spec.as_mut().unwrap().selector.match_labels =
            Some(BTreeMap::from([("app".to_string(), "something-else".to_string())]));

        let err = merge_deployment(&current, &collector("a").deployment()).unwrap_err();

        assert!(matches!(err, ControllerError::ImmutableField { field: "spec.selector", .. }));
    }

    #[test]
    fn test_pod_annotations_follow_class() {
        let mut with_annotation = collector("a");
        with_annotation.pod_annotations = BTreeMap::from([("a".to_string(), "1".to_string())]);
        let current = stored(&with_annotation.deployment());

        let merged = merge_deployment(&current, &collector("a").deployment()).unwrap();

        assert_eq!(merged.spec.unwrap().template.metadata.unwrap().annotations, None);
    }

    #[tokio::test]
    async fn test_sync_creates_then_is_unchanged() {
        let store = MockStateStore::new();
        let reconciler = create_test_reconciler(&store);
        let spec = collector("a");

        assert_eq!(reconciler.sync_deployment(&spec).await.unwrap(), ChildOutcome::Created);
        assert_eq!(reconciler.sync_deployment(&spec).await.unwrap(), ChildOutcome::Unchanged);
        assert_eq!(store.child_writes(), 1);

        let mut scaled = spec.clone();
        scaled.replicas = 3;
        assert_eq!(reconciler.sync_deployment(&scaled).await.unwrap(), ChildOutcome::Updated);
        let stored = store.deployment(TEST_NAMESPACE, "gw-a").unwrap();
        assert_eq!(stored.spec.unwrap().replicas, Some(3));
    }

    #[tokio::test]
    async fn test_sync_refuses_child_controlled_by_another_owner() {
        let store = MockStateStore::new();
        let mut foreign = collector("a").deployment();
        foreign.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "ReplicaSet".to_string(),
            name: "someone-else".to_string(),
            uid: "other-uid".to_string(),
            controller: Some(true),
            ..Default::default()
        }]);
        store.insert_deployment(TEST_NAMESPACE, foreign).unwrap();
        let reconciler = create_test_reconciler(&store);

        let err = reconciler.sync_deployment(&collector("a")).await.unwrap_err();

        assert!(matches!(err, ControllerError::AlreadyOwned { kind: "Deployment", .. }));
        assert_eq!(store.child_writes(), 0);
    }

    #[tokio::test]
    async fn test_sync_surfaces_conflict() {
        let store = MockStateStore::new();
        let reconciler = create_test_reconciler(&store);
        reconciler.sync_deployment(&collector("a")).await.unwrap();

        store.fail_next(StoreOperation::ReplaceDeployment, Some("gw-a"), FailureKind::Conflict);
        let mut scaled = collector("a");
        scaled.replicas = 2;
        let err = reconciler.sync_deployment(&scaled).await.unwrap_err();

        assert!(err.is_conflict());
        let stored = store.deployment(TEST_NAMESPACE, "gw-a").unwrap();
        assert_eq!(stored.spec.unwrap().replicas, Some(1));
    }

    #[test]
    fn test_non_canonical_quantities_are_not_drift() {
        let mut class = test_class("a");
        class.resources = Some(ResourceRequirements {
            limits: quantities(&[("cpu", "0.5"), ("memory", "1024Mi")]),
            requests: quantities(&[("cpu", "0.25")]),
            claims: None,
        });
        let desired = collector_for(&class).deployment();

        // Stored copy carries the server's canonical spelling
        let mut current = stored(&desired);
        current.spec.as_mut().unwrap().template.spec.as_mut().unwrap().containers[0].resources =
            Some(ResourceRequirements {
                limits: quantities(&[("cpu", "500m"), ("memory", "1Gi")]),
                requests: quantities(&[("cpu", "250m")]),
                claims: None,
            });

        assert_eq!(plan_apply(Some(&current), &desired, merge_deployment).unwrap(), ApplyPlan::Unchanged);
    }

    #[test]
    fn test_empty_tolerations_and_node_selector_are_not_drift() {
        let mut class = test_class("a");
        class.tolerations = Some(Vec::new());
        class.node_selector = Some(BTreeMap::new());
        let desired = collector_for(&class).deployment();

        // The API server drops empty lists and maps
        let mut current = stored(&desired);
        let pod = current.spec.as_mut().unwrap().template.spec.as_mut().unwrap();
        pod.tolerations = None;
        pod.node_selector = None;

        let pod_spec = desired.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert_eq!(pod_spec.tolerations, None);
        assert_eq!(pod_spec.node_selector, None);
        assert_eq!(plan_apply(Some(&current), &desired, merge_deployment).unwrap(), ApplyPlan::Unchanged);
    }
}
