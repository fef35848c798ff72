//! Unit tests for desired-state derivation

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::desired::*;
    use crate::test_utils::*;
    use k8s_openapi::api::core::v1::{ContainerPort, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use std::collections::BTreeMap;

    fn ports_of(spec: &CollectorSpec) -> Vec<(String, i32, String)> {
        spec.ports.iter()
            .map(|p| (
                p.name.clone().unwrap_or_default(),
                p.container_port,
                p.protocol.clone().unwrap_or_default(),
            ))
            .collect()
    }

    #[test]
    fn test_argument_order() {
        let mut gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        gateway.spec.extra_args = vec!["--x".to_string()];
        let mut class = test_class("a");
        class.extra_args = vec!["--y".to_string()];

        let spec = CollectorSpec::extract(&gateway, &class).unwrap();

        assert_eq!(spec.args, vec!["--config=/etc/otel/config.yaml", "--x", "--y"]);
    }

    #[test]
    fn test_default_ports_on_both_children() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let spec = CollectorSpec::extract(&gateway, &test_class("a")).unwrap();

        assert_eq!(
            ports_of(&spec),
            vec![
                ("otlp-grpc".to_string(), 4317, "TCP".to_string()),
                ("otlp-http".to_string(), 4318, "TCP".to_string()),
                ("metrics".to_string(), 8888, "TCP".to_string()),
            ]
        );

        let deployment = spec.deployment();
        let container = &deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.ports.as_ref().map(Vec::len), Some(3));

        let service = spec.service();
        let service_ports = service.spec.as_ref().unwrap().ports.as_ref().unwrap();
        assert_eq!(service_ports.len(), 3);
        assert_eq!(service_ports[0].port, 4317);
        assert_eq!(service_ports[0].target_port, Some(IntOrString::Int(4317)));
        assert_eq!(service_ports[2].name.as_deref(), Some("metrics"));
    }

    #[test]
    fn test_class_ports_replace_defaults_and_default_protocol() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let mut class = test_class("syslog");
        class.ports = vec![
            ContainerPort {
                name: Some("syslog".to_string()),
                container_port: 5514,
                protocol: Some("UDP".to_string()),
                ..Default::default()
            },
            ContainerPort {
                name: Some("otlp".to_string()),
                container_port: 4317,
                ..Default::default()
            },
        ];

        let spec = CollectorSpec::extract(&gateway, &class).unwrap();

        assert_eq!(
            ports_of(&spec),
            vec![
                ("syslog".to_string(), 5514, "UDP".to_string()),
                ("otlp".to_string(), 4317, "TCP".to_string()),
            ]
        );
    }

    #[test]
    fn test_identity_labels_and_owner() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let spec = CollectorSpec::extract(&gateway, &test_class("edge")).unwrap();
        let deployment = spec.deployment();
        let service = spec.service();

        assert_eq!(deployment.metadata.name.as_deref(), Some("gw-edge"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some(TEST_NAMESPACE));
        let labels = deployment.metadata.labels.clone().unwrap();
        assert_eq!(labels.get(PART_OF_LABEL).map(String::as_str), Some("gw"));
        assert_eq!(labels.get(CLASS_LABEL).map(String::as_str), Some("edge"));
        assert_eq!(service.metadata.labels, deployment.metadata.labels);

        let owner = &deployment.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.uid, "gw-uid");
        assert_eq!(owner.kind, "ObservabilityGateway");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_service_selector_matches_pod_labels() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let spec = CollectorSpec::extract(&gateway, &test_class("edge")).unwrap();
        let deployment = spec.deployment();
        let deployment_spec = deployment.spec.unwrap();

        let expected = BTreeMap::from([("app".to_string(), "gw-edge".to_string())]);
        assert_eq!(deployment_spec.selector.match_labels.as_ref(), Some(&expected));
        assert_eq!(deployment_spec.template.metadata.unwrap().labels.as_ref(), Some(&expected));
        assert_eq!(spec.service().spec.unwrap().selector.as_ref(), Some(&expected));
    }

    #[test]
    fn test_config_volume_and_mount() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let deployment = desired_deployment(&gateway, &test_class("a")).unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();

        let container = &pod.containers[0];
        assert_eq!(container.name, CONTAINER_NAME);
        assert_eq!(container.image.as_deref(), Some(TEST_IMAGE));
        let mount = &container.volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.name, CONFIG_VOLUME_NAME);
        assert_eq!(mount.mount_path, CONFIG_MOUNT_PATH);

        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        let source = serde_json::to_value(volumes[0].config_map.as_ref().unwrap()).unwrap();
        assert_eq!(source["name"], TEST_CONFIG_MAP);
        assert_eq!(source["defaultMode"], 420);
    }

    #[test]
    fn test_service_is_cluster_ip() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let service = desired_service(&gateway, &test_class("a")).unwrap();
        let spec = service.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(spec.cluster_ip, None);
    }

    #[test]
    fn test_replicas_and_scheduling_fields() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let mut class = test_class("a");
        class.replicas = 4;
        class.node_selector = Some(BTreeMap::from([("pool".to_string(), "telemetry".to_string())]));
        class.pod_annotations = BTreeMap::from([("prometheus.io/scrape".to_string(), "true".to_string())]);

        let deployment = desired_deployment(&gateway, &class).unwrap();
        let spec = deployment.spec.unwrap();

        assert_eq!(spec.replicas, Some(4));
        let template = spec.template;
        assert_eq!(
            template.metadata.unwrap().annotations.unwrap().get("prometheus.io/scrape").map(String::as_str),
            Some("true")
        );
        assert_eq!(template.spec.unwrap().node_selector, class.node_selector);
    }

    #[test]
    fn test_classes_do_not_share_resources() {
        let mut limited = test_class("a");
        limited.resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([("cpu".to_string(), Quantity("500m".to_string()))])),
            ..Default::default()
        });
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![limited.clone(), test_class("b")]);

        let mut a = CollectorSpec::extract(&gateway, &gateway.spec.classes[0]).unwrap();
        let b = CollectorSpec::extract(&gateway, &gateway.spec.classes[1]).unwrap();
        a.resources.limits = None;

        assert_eq!(gateway.spec.classes[0].resources, limited.resources);
        assert_eq!(b.resources, ResourceRequirements::default());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let class = test_class("a");
        assert_eq!(desired_deployment(&gateway, &class).unwrap(), desired_deployment(&gateway, &class).unwrap());
        assert_eq!(desired_service(&gateway, &class).unwrap(), desired_service(&gateway, &class).unwrap());
    }

    #[test]
    fn test_validation_errors() {
        let class = test_class("a");

        let mut gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        gateway.spec.image = String::new();
        assert!(matches!(CollectorSpec::extract(&gateway, &class), Err(ControllerError::Validation(_))));

        let mut gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        gateway.spec.config_config_map = " ".to_string();
        assert!(matches!(CollectorSpec::extract(&gateway, &class), Err(ControllerError::Validation(_))));

        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let mut negative = test_class("a");
        negative.replicas = -1;
        assert!(matches!(CollectorSpec::extract(&gateway, &negative), Err(ControllerError::Validation(_))));

        assert!(matches!(CollectorSpec::extract(&gateway, &test_class("")), Err(ControllerError::Validation(_))));
        assert!(matches!(CollectorSpec::extract(&gateway, &test_class("Edge")), Err(ControllerError::Validation(_))));

        let mut no_uid = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        no_uid.metadata.uid = None;
        assert!(matches!(CollectorSpec::extract(&no_uid, &class), Err(ControllerError::Validation(_))));
    }

    #[test]
    fn test_zero_replicas_allowed() {
        let gateway = create_test_gateway("gw", TEST_NAMESPACE, vec![]);
        let mut class = test_class("a");
        class.replicas = 0;
        assert_eq!(CollectorSpec::extract(&gateway, &class).unwrap().replicas, 0);
    }

    #[test]
    fn test_is_dns_label() {
        assert!(is_dns_label("gw-edge"));
        assert!(is_dns_label("a1"));
        assert!(!is_dns_label(""));
        assert!(!is_dns_label("1gw"));
        assert!(!is_dns_label("gw-"));
        assert!(!is_dns_label("gw_edge"));
        assert!(!is_dns_label("Gw"));
        assert!(is_dns_label(&"a".repeat(63)));
        assert!(!is_dns_label(&"a".repeat(64)));
    }

    #[test]
    fn test_owned_selector() {
        assert_eq!(owned_selector("gw"), "app.kubernetes.io/part-of=gw");
    }
}
