//! Prints the ObservabilityGateway CRD manifest as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/observabilitygateway.yaml`

use anyhow::Result;
use crds::ObservabilityGateway;
use kube::CustomResourceExt;

fn main() -> Result<()> {
    print!("{}", serde_yaml::to_string(&ObservabilityGateway::crd())?);
    Ok(())
}
