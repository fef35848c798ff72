//! ObservabilityGateway CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the observability gateway controller.

pub mod observability_gateway;

pub use observability_gateway::*;
