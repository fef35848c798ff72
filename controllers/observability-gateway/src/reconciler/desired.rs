//! Desired state for a gateway class
//!
//! Pure derivation of the child Deployment and Service for one class. No
//! store access happens here: identical inputs always yield structurally
//! identical objects, which is what makes no-op detection in the
//! synchronizers possible.
//!
//! Both children are built from the same `CollectorSpec`, so the Service's
//! selector and ports can never drift from the Deployment's pod labels and
//! container ports.

use crate::error::ControllerError;
use crate::reconciler::quantity::canonical_resources;
use crds::{GatewayClass, ObservabilityGateway};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec,
    ResourceRequirements, Service, ServicePort, ServiceSpec, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::Resource;
use std::collections::BTreeMap;

/// Label linking a child to its gateway (used by the orphan collector's list)
pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";
/// Label recording which class a child was generated for
pub const CLASS_LABEL: &str = "observability-class";
/// Pod label shared by the Deployment selector and the Service selector
pub const SELECTOR_LABEL: &str = "app";

pub const CONTAINER_NAME: &str = "otel-collector";
pub const CONFIG_VOLUME_NAME: &str = "otel-config";
pub const CONFIG_MOUNT_PATH: &str = "/etc/otel";
pub const CONFIG_FLAG: &str = "--config=/etc/otel/config.yaml";

const DEFAULT_PROTOCOL: &str = "TCP";
const SERVICE_TYPE: &str = "ClusterIP";
// 0644, what the API server fills in for configMap volumes
const CONFIG_VOLUME_MODE: i32 = 420;
const MAX_NAME_LENGTH: usize = 63;

/// Name of both children generated for `class_name`.
pub fn child_name(gateway_name: &str, class_name: &str) -> String {
    format!("{}-{}", gateway_name, class_name)
}

/// Identity labels carried by every child.
pub fn child_labels(gateway_name: &str, class_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (PART_OF_LABEL.to_string(), gateway_name.to_string()),
        (CLASS_LABEL.to_string(), class_name.to_string()),
    ])
}

/// Pod selector for a child. The Deployment and the Service both call this.
pub fn pod_selector(child_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(SELECTOR_LABEL.to_string(), child_name.to_string())])
}

/// Label selector matching every child of a gateway.
pub fn owned_selector(gateway_name: &str) -> String {
    format!("{}={}", PART_OF_LABEL, gateway_name)
}

/// OTLP gRPC, OTLP HTTP and the collector's own metrics port.
pub fn default_ports() -> Vec<ContainerPort> {
    [("otlp-grpc", 4317), ("otlp-http", 4318), ("metrics", 8888)]
        .into_iter()
        .map(|(name, port)| ContainerPort {
            name: Some(name.to_string()),
            container_port: port,
            protocol: Some(DEFAULT_PROTOCOL.to_string()),
            ..Default::default()
        })
        .collect()
}

/// Container ports for a class: its own (protocol defaulted to TCP) or the defaults.
pub fn effective_ports(class: &GatewayClass) -> Vec<ContainerPort> {
    if class.ports.is_empty() {
        return default_ports();
    }
    class.ports.iter()
        .cloned()
        .map(|mut port| {
            port.protocol.get_or_insert_with(|| DEFAULT_PROTOCOL.to_string());
            port
        })
        .collect()
}

/// Collector arguments: config flag, then gateway-wide, then per-class extras.
pub fn collector_args(gateway_args: &[String], class_args: &[String]) -> Vec<String> {
    std::iter::once(CONFIG_FLAG.to_string())
        .chain(gateway_args.iter().cloned())
        .chain(class_args.iter().cloned())
        .collect()
}

/// Service ports mirroring container ports 1:1.
pub fn service_ports(ports: &[ContainerPort]) -> Vec<ServicePort> {
    ports.iter()
        .map(|p| ServicePort {
            name: p.name.clone(),
            port: p.container_port,
            protocol: p.protocol.clone(),
            target_port: Some(IntOrString::Int(p.container_port)),
            ..Default::default()
        })
        .collect()
}

/// DNS-1035 label: lowercase alphanumerics and '-', starting with a letter,
/// ending alphanumeric, at most 63 characters. Service names must satisfy it.
pub fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    name.len() <= MAX_NAME_LENGTH
        && first.is_ascii_lowercase()
        && (last.is_ascii_lowercase() || last.is_ascii_digit())
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

/// Everything both children of one class are derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSpec {
    pub name: String,
    pub namespace: String,
    pub class_name: String,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
    pub owner: OwnerReference,
    pub replicas: i32,
    pub image: String,
    pub args: Vec<String>,
    pub ports: Vec<ContainerPort>,
    pub config_map: String,
    pub resources: ResourceRequirements,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub tolerations: Option<Vec<Toleration>>,
    pub affinity: Option<Affinity>,
    pub pod_annotations: BTreeMap<String, String>,
}

impl CollectorSpec {
    /// Derives the collector spec for one class of `gateway`.
    ///
    /// Every nested structure is cloned out of the gateway, so the result
    /// never shares data with another class's spec. Quantities are made
    /// canonical and empty selectors or toleration lists dropped, matching
    /// what the API server hands back.
    pub fn extract(gateway: &ObservabilityGateway, class: &GatewayClass) -> Result<Self, ControllerError> {
        let gateway_name = gateway.metadata.name.as_deref()
            .ok_or_else(|| ControllerError::Validation("ObservabilityGateway missing name".to_string()))?;
        let namespace = gateway.metadata.namespace.as_deref()
            .ok_or_else(|| ControllerError::Validation(format!("ObservabilityGateway {} missing namespace", gateway_name)))?;
        let spec = &gateway.spec;

        if spec.image.trim().is_empty() {
            return Err(ControllerError::Validation(format!("{}/{}: spec.image is required", namespace, gateway_name)));
        }
        if spec.config_config_map.trim().is_empty() {
            return Err(ControllerError::Validation(format!("{}/{}: spec.configConfigMap is required", namespace, gateway_name)));
        }
        if class.name.is_empty() {
            return Err(ControllerError::Validation(format!("{}/{}: class name must not be empty", namespace, gateway_name)));
        }
        if class.replicas < 0 {
            return Err(ControllerError::Validation(format!(
                "{}/{}: class {} has negative replicas ({})",
                namespace, gateway_name, class.name, class.replicas
            )));
        }

        let name = child_name(gateway_name, &class.name);
        if !is_dns_label(&name) {
            return Err(ControllerError::Validation(format!(
                "{}/{}: class {} yields child name {:?}, which is not a DNS-1035 label of at most {} characters",
                namespace, gateway_name, class.name, name, MAX_NAME_LENGTH
            )));
        }

        let owner = gateway.controller_owner_ref(&())
            .ok_or_else(|| ControllerError::Validation(format!("{}/{}: gateway has no uid yet", namespace, gateway_name)))?;

        Ok(Self {
            selector: pod_selector(&name),
            labels: child_labels(gateway_name, &class.name),
            name,
            namespace: namespace.to_string(),
            class_name: class.name.clone(),
            owner,
            replicas: class.replicas,
            image: spec.image.clone(),
            args: collector_args(&spec.extra_args, &class.extra_args),
            ports: effective_ports(class),
            config_map: spec.config_config_map.clone(),
            resources: class.resources.as_ref().map(canonical_resources).unwrap_or_default(),
            node_selector: class.node_selector.clone().filter(|selector| !selector.is_empty()),
            tolerations: class.tolerations.clone().filter(|tolerations| !tolerations.is_empty()),
            affinity: class.affinity.clone(),
            pod_annotations: class.pod_annotations.clone(),
        })
    }

    fn metadata(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels.clone()),
            owner_references: Some(vec![self.owner.clone()]),
            ..Default::default()
        }
    }

    /// The collector Deployment for this class.
    pub fn deployment(&self) -> Deployment {
        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            args: Some(self.args.clone()),
            ports: Some(self.ports.clone()),
            volume_mounts: Some(vec![VolumeMount {
                name: CONFIG_VOLUME_NAME.to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                ..Default::default()
            }]),
            resources: Some(self.resources.clone()),
            ..Default::default()
        };

        let volume = Volume {
            name: CONFIG_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: self.config_map.clone().into(),
                default_mode: Some(CONFIG_VOLUME_MODE),
                ..Default::default()
            }),
            ..Default::default()
        };

        let annotations = (!self.pod_annotations.is_empty()).then(|| self.pod_annotations.clone());

        Deployment {
            metadata: self.metadata(),
            spec: Some(DeploymentSpec {
                replicas: Some(self.replicas),
                selector: LabelSelector {
                    match_labels: Some(self.selector.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.selector.clone()),
                        annotations,
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes: Some(vec![volume]),
                        node_selector: self.node_selector.clone(),
                        tolerations: self.tolerations.clone(),
                        affinity: self.affinity.clone(),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// The ClusterIP Service fronting this class's pods.
    pub fn service(&self) -> Service {
        Service {
            metadata: self.metadata(),
            spec: Some(ServiceSpec {
                selector: Some(self.selector.clone()),
                ports: Some(service_ports(&self.ports)),
                type_: Some(SERVICE_TYPE.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Desired Deployment for one class of `gateway`.
pub fn desired_deployment(gateway: &ObservabilityGateway, class: &GatewayClass) -> Result<Deployment, ControllerError> {
    Ok(CollectorSpec::extract(gateway, class)?.deployment())
}

/// Desired Service for one class of `gateway`.
pub fn desired_service(gateway: &ObservabilityGateway, class: &GatewayClass) -> Result<Service, ControllerError> {
    Ok(CollectorSpec::extract(gateway, class)?.service())
}
