//! The durable job row backing the pipeline outbox.

use crate::id::ExecutionId;
use crate::request::DeploymentRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A row in the `deployment_jobs` outbox table. `id` is the monotonic
/// surrogate key; `execution_id` is the caller-visible uuid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentJob {
    pub id: i64,
    pub execution_id: ExecutionId,
    pub payload: DeploymentRequest,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
    pub processing_instance: Option<String>,
    pub error_message: Option<String>,
}

impl DeploymentJob {
    /// Whether this row may still be re-leased after a failure.
    pub fn retries_remaining(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
