//! Named lifecycle events and the sink abstraction that publishes them.
//!
//! Every state transition the orchestrator makes is both a `tracing` event
//! and, where an `EventSink` is configured, a structured event under one of
//! these names. The default sink just logs; `rollout-api`/`rollout-cli`
//! compose their own when they need to fan events out further.

use crate::id::{ApprovalId, ExecutionId};
use async_trait::async_trait;
use serde_json::Value;

pub mod names {
    pub const DEPLOYMENT_STARTED: &str = "deployment.started";
    pub const DEPLOYMENT_STAGE_STARTED: &str = "deployment.stage.started";
    pub const DEPLOYMENT_STAGE_SUCCEEDED: &str = "deployment.stage.succeeded";
    pub const DEPLOYMENT_STAGE_FAILED: &str = "deployment.stage.failed";
    pub const DEPLOYMENT_ROLLBACK_STARTED: &str = "deployment.rollback.started";
    pub const DEPLOYMENT_ROLLBACK_COMPLETED: &str = "deployment.rollback.completed";
    pub const DEPLOYMENT_SUCCEEDED: &str = "deployment.succeeded";
    pub const DEPLOYMENT_FAILED: &str = "deployment.failed";
    pub const DEPLOYMENT_CANCELLED: &str = "deployment.cancelled";
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    pub const APPROVAL_GRANTED: &str = "approval.granted";
    pub const APPROVAL_REJECTED: &str = "approval.rejected";
    pub const APPROVAL_EXPIRED: &str = "approval.expired";
}

/// One emitted event: a fixed name from [`names`], the execution it
/// concerns, and a free-form JSON payload (stage name, node counts,
/// rejection reason, ...).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Event {
    pub name: &'static str,
    pub execution_id: ExecutionId,
    pub approval_id: Option<ApprovalId>,
    pub payload: Value,
}

impl Event {
    pub fn new(name: &'static str, execution_id: ExecutionId, payload: Value) -> Self {
        Self {
            name,
            execution_id,
            approval_id: None,
            payload,
        }
    }

    pub fn for_approval(
        name: &'static str,
        execution_id: ExecutionId,
        approval_id: ApprovalId,
        payload: Value,
    ) -> Self {
        Self {
            name,
            execution_id,
            approval_id: Some(approval_id),
            payload,
        }
    }
}

/// Where lifecycle events go. Implementations must not block the caller for
/// long — the orchestrator awaits this inline on every transition.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: Event);
}

/// Logs every event at `info` via `tracing`. The only sink wired by default;
/// matches the teacher's habit of treating structured logs as the baseline
/// observability surface rather than bolting on a separate event bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: Event) {
        tracing::info!(
            event = event.name,
            execution_id = %event.execution_id,
            approval_id = event.approval_id.map(|id| id.to_string()),
            payload = %event.payload,
            "lifecycle event"
        );
    }
}
