//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::reconciler::{GatewayKey, Reconciler};
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use state_store::MockStateStore;

pub const TEST_NAMESPACE: &str = "telemetry";
pub const TEST_IMAGE: &str = "otel/opentelemetry-collector-contrib:0.110.0";
pub const TEST_CONFIG_MAP: &str = "otel-collector-config";

/// Helper to create a class with defaults (1 replica, default ports)
pub fn test_class(name: &str) -> GatewayClass {
    GatewayClass {
        name: name.to_string(),
        ..Default::default()
    }
}

/// Helper to create test ObservabilityGateway CRD
///
/// The uid is derived from the name so owner references are predictable.
pub fn create_test_gateway(name: &str, namespace: &str, classes: Vec<GatewayClass>) -> ObservabilityGateway {
    ObservabilityGateway {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{}-uid", name)),
            generation: Some(1),
            ..Default::default()
        },
        spec: ObservabilityGatewaySpec {
            image: TEST_IMAGE.to_string(),
            config_config_map: TEST_CONFIG_MAP.to_string(),
            extra_args: Vec::new(),
            classes,
        },
        status: None,
    }
}

/// Helper to create a reconciler over a clone of `store`
pub fn create_test_reconciler(store: &MockStateStore) -> Reconciler {
    Reconciler::new(store.clone(), None)
}

/// Adds a gateway named `name` with `classes` to the store and returns its key
pub fn seed_gateway(store: &MockStateStore, name: &str, classes: &[&str]) -> (ObservabilityGateway, GatewayKey) {
    let classes = classes.iter().map(|c| test_class(c)).collect();
    let stored = store.add_gateway(create_test_gateway(name, TEST_NAMESPACE, classes));
    (stored, GatewayKey::new(TEST_NAMESPACE, name))
}

/// Replaces the classes of a stored gateway, as a user edit would
pub fn set_classes(store: &MockStateStore, key: &GatewayKey, classes: Vec<GatewayClass>) {
    let mut spec = store.gateway(&key.namespace, &key.name)
        .map(|gw| gw.spec)
        .unwrap_or_default();
    spec.classes = classes;
    store.update_gateway_spec(&key.namespace, &key.name, spec).unwrap();
}
