//! Ready condition publishing
//!
//! Runs after the reconcile pass and never changes its outcome. The status
//! is only written when it differs from what is stored, so publishing does
//! not feed new watch events back into the controller once converged.

use crate::error::ControllerError;
use crate::reconciler::{GatewayKey, ReconcileReport, Reconciler};
use chrono::{DateTime, Utc};
use crds::{ConditionStatus, GatewayCondition, ObservabilityGatewayStatus};
use tracing::{debug, warn};

pub const READY_CONDITION: &str = "Ready";
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_FAILED: &str = "ReconcileFailed";

/// Status, reason and message of the Ready condition for a pass outcome.
pub fn ready_condition(outcome: Result<&ReconcileReport, &ControllerError>) -> (ConditionStatus, &'static str, String) {
    match outcome {
        Ok(report) => (
            ConditionStatus::True,
            REASON_RECONCILED,
            format!("{} classes reconciled", report.classes),
        ),
        Err(e) => (ConditionStatus::False, REASON_FAILED, e.to_string()),
    }
}

/// Builds the next status from the stored one.
///
/// Conditions other than Ready are kept. `lastTransitionTime` moves to `now`
/// only when the Ready status flips.
pub fn next_status(
    current: Option<&ObservabilityGatewayStatus>,
    generation: Option<i64>,
    status: ConditionStatus,
    reason: &str,
    message: String,
    now: DateTime<Utc>,
) -> ObservabilityGatewayStatus {
    let mut next = current.cloned().unwrap_or_default();
    next.observed_generation = generation;

    let previous = next.conditions.iter().position(|c| c.type_ == READY_CONDITION);
    let last_transition_time = match previous.map(|i| &next.conditions[i]) {
        Some(prev) if prev.status == status => prev.last_transition_time.or(Some(now)),
        _ => Some(now),
    };

    let condition = GatewayCondition {
        type_: READY_CONDITION.to_string(),
        status,
        reason: reason.to_string(),
        message,
        last_transition_time,
        observed_generation: generation,
    };
    match previous {
        Some(i) => next.conditions[i] = condition,
        None => next.conditions.push(condition),
    }
    next
}

impl Reconciler {
    /// Records the outcome of a pass on the gateway's Ready condition.
    ///
    /// Failures are logged; the pass outcome stands either way.
    pub(crate) async fn publish_status(&self, key: &GatewayKey, outcome: Result<&ReconcileReport, &ControllerError>) {
        let gateway = match self.store.get_gateway(&key.namespace, &key.name).await {
            Ok(Some(gateway)) => gateway,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to fetch {} for status update: {}", key, e);
                return;
            }
        };
        if gateway.metadata.deletion_timestamp.is_some() {
            return;
        }

        let (status, reason, message) = ready_condition(outcome);
        let next = next_status(
            gateway.status.as_ref(),
            gateway.metadata.generation,
            status,
            reason,
            message,
            Utc::now(),
        );

        if gateway.status.as_ref() == Some(&next) {
            debug!("Status of {} unchanged", key);
            return;
        }
        if let Err(e) = self.store.patch_gateway_status(&key.namespace, &key.name, &next).await {
            warn!("Failed to update status of {}: {}", key, e);
        }
    }
}
