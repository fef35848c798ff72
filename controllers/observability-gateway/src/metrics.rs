//! Prometheus metrics and the health/metrics HTTP endpoint.

use crate::error::ControllerError;
use crate::reconciler::ReconcileReport;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const NAMESPACE: &str = "observability_gateway";

/// Controller metrics, registered on a private registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub reconcile_total: IntCounterVec,
    pub reconcile_errors: IntCounterVec,
    pub reconcile_duration: Histogram,
    pub child_operations: IntCounterVec,
    pub orphans_deleted: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new("reconcile_total", "Reconcile passes by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(reconcile_total.clone()))?;

        let reconcile_errors = IntCounterVec::new(
            Opts::new("reconcile_errors_total", "Failed reconcile passes by reason").namespace(NAMESPACE),
            &["reason"],
        )?;
        registry.register(Box::new(reconcile_errors.clone()))?;

        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new("reconcile_duration_seconds", "Duration of reconcile passes")
                .namespace(NAMESPACE)
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        let child_operations = IntCounterVec::new(
            Opts::new("child_operations_total", "Child synchronizer outcomes").namespace(NAMESPACE),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(child_operations.clone()))?;

        let orphans_deleted = IntCounter::with_opts(
            Opts::new("orphans_deleted_total", "Children deleted because their class was removed").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(orphans_deleted.clone()))?;

        Ok(Self {
            registry,
            reconcile_total,
            reconcile_errors,
            reconcile_duration,
            child_operations,
            orphans_deleted,
        })
    }

    pub fn record_success(&self, report: &ReconcileReport, elapsed: Duration) {
        self.reconcile_duration.observe(elapsed.as_secs_f64());
        self.reconcile_total.with_label_values(&["success"]).inc();
        for child in &report.children {
            self.child_operations
                .with_label_values(&[child.kind.as_str(), child.outcome.as_str()])
                .inc();
        }
        self.orphans_deleted.inc_by(report.orphans_deleted.len() as u64);
    }

    pub fn record_failure(&self, error: &ControllerError, elapsed: Duration) {
        self.reconcile_duration.observe(elapsed.as_secs_f64());
        self.reconcile_total.with_label_values(&["error"]).inc();
        self.reconcile_errors.with_label_values(&[error.kind()]).inc();
    }

    /// Current metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        exposition_text(buffer)
    }
}

fn exposition_text(buffer: Vec<u8>) -> Result<String, ControllerError> {
    String::from_utf8(buffer).map_err(|e| {
        ControllerError::Metrics(prometheus::Error::Msg(format!("metrics output is not UTF-8: {}", e)))
    })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            warn!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Routes served on the metrics address.
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// Serves health and metrics endpoints until the process exits.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving /healthz, /readyz and /metrics on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile_helpers::{ChildKind, ChildOutcome};
    use crate::reconciler::{ChildReport, GatewayKey};
    use state_store::StoreError;

    #[test]
    fn test_record_success_counts_children() {
        let metrics = Metrics::new().unwrap();
        let report = ReconcileReport {
            key: GatewayKey::new("telemetry", "gw"),
            found: true,
            classes: 1,
            children: vec![
                ChildReport { kind: ChildKind::Deployment, name: "gw-a".to_string(), outcome: ChildOutcome::Created },
                ChildReport { kind: ChildKind::Service, name: "gw-a".to_string(), outcome: ChildOutcome::Unchanged },
            ],
            orphans_deleted: vec![(ChildKind::Service, "gw-old".to_string())],
            requeue_after: None,
        };

        metrics.record_success(&report, Duration::from_millis(20));

        assert_eq!(metrics.reconcile_total.with_label_values(&["success"]).get(), 1);
        assert_eq!(metrics.child_operations.with_label_values(&["Deployment", "created"]).get(), 1);
        assert_eq!(metrics.child_operations.with_label_values(&["Service", "unchanged"]).get(), 1);
        assert_eq!(metrics.orphans_deleted.get(), 1);
    }

    #[test]
    fn test_render_includes_error_reason() {
        let metrics = Metrics::new().unwrap();
        let error = ControllerError::Store(StoreError::Conflict("stale".to_string()));
        metrics.record_failure(&error, Duration::from_millis(5));

        let text = metrics.render().unwrap();
        assert!(text.contains("observability_gateway_reconcile_errors_total{reason=\"conflict\"} 1"));
        assert!(text.contains("observability_gateway_reconcile_duration_seconds"));
    }

    #[test]
    fn test_non_utf8_exposition_is_metrics_error() {
        let err = exposition_text(vec![0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ControllerError::Metrics(_)));
        assert_eq!(err.kind(), "metrics");

        assert_eq!(exposition_text(b"up 1\n".to_vec()).unwrap(), "up 1\n");
    }
}
