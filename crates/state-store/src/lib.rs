//! Declarative State Store
//!
//! Thin, mockable abstraction over the parts of the Kubernetes API the
//! observability gateway controller touches: the `ObservabilityGateway`
//! parent resource and its child Deployments and Services.
//!
//! # Example
//!
//! ```no_run
//! use state_store::{KubeStateStore, StateStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = KubeStateStore::try_default().await?;
//!
//! // Fetch a gateway; a missing object is `None`, not an error
//! if let Some(gateway) = store.get_gateway("telemetry", "edge").await? {
//!     println!("{} classes", gateway.spec.classes.len());
//! }
//!
//! // List the children labeled as part of it
//! let deployments = store
//!     .list_deployments("telemetry", "app.kubernetes.io/part-of=edge")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{KubeStateStore, FIELD_MANAGER};
pub use error::StoreError;
pub use store_trait::StateStore;
#[cfg(feature = "test-util")]
pub use mock::{FailureKind, MockStateStore, StoreOperation};
