//! ObservabilityGateway CRD
//!
//! Declares a fleet of OpenTelemetry collector "classes". Each class is
//! materialized by the controller as one Deployment and one Service named
//! `{gateway}-{class}` and owned by the gateway.

use k8s_openapi::api::core::v1::{Affinity, ContainerPort, ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "observability.x-k8s.io",
    version = "v1alpha1",
    kind = "ObservabilityGateway",
    namespaced,
    status = "ObservabilityGatewayStatus",
    shortname = "ogw",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityGatewaySpec {
    /// Collector container image (e.g. "otel/opentelemetry-collector-contrib:0.110.0")
    pub image: String,

    /// Name of the ConfigMap holding the collector's `config.yaml`
    pub config_config_map: String,

    /// Arguments appended to every class's container, after the config flag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Collector classes, one Deployment + Service each. Names must be unique.
    #[serde(default)]
    pub classes: Vec<GatewayClass>,
}

impl ObservabilityGatewaySpec {
    /// Names of all classes currently declared.
    pub fn class_names(&self) -> BTreeSet<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One named collector variant within a gateway.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayClass {
    /// Class name; also the suffix of the child resource names
    pub name: String,

    /// Desired replica count
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Container resource limits and requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Arguments appended after the gateway-wide extra arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Container ports; the OTLP gRPC/HTTP and metrics ports are used when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    /// Annotations placed on the pod template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_annotations: BTreeMap<String, String>,
}

fn default_replicas() -> i32 {
    1
}

impl Default for GatewayClass {
    fn default() -> Self {
        Self {
            name: String::new(),
            replicas: default_replicas(),
            resources: None,
            node_selector: None,
            tolerations: None,
            affinity: None,
            extra_args: Vec::new(),
            ports: Vec::new(),
            pod_annotations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityGatewayStatus {
    /// Generation of the spec the conditions were computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<GatewayCondition>,
}

impl ObservabilityGatewayStatus {
    /// Looks up a condition by type.
    pub fn condition(&self, type_: &str) -> Option<&GatewayCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

/// Status condition, shaped like `metav1.Condition`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCondition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    /// CamelCase machine-readable reason
    pub reason: String,

    #[serde(default)]
    pub message: String,

    /// Last time `status` flipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}
