//! Error kinds shared across the orchestrator core.
//!
//! These map 1:1 to the error kinds table in the specification; the HTTP
//! layer translates them into status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("timed out acquiring lock for {0}")]
    LockTimeout(String),

    #[error("approval rejected by {responder}: {reason}")]
    ApprovalRejected { responder: String, reason: String },

    #[error("approval expired at {timeout_at}")]
    ApprovalExpired {
        timeout_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("not authorized to decide this approval: {0}")]
    ApprovalNotAuthorized(String),

    #[error("approval already decided")]
    ApprovalAlreadyDecided,

    #[error("node {node_id} failed to deploy: {message}")]
    NodeDeployFailed { node_id: String, message: String },

    #[error("node {node_id} unhealthy after deploy")]
    NodeUnhealthyAfterDeploy { node_id: String },

    #[error("strategy failed: {0}")]
    StrategyFailure(String),

    #[error("job lease orphaned: {0}")]
    OrphanedLease(String),

    #[error("max retries exceeded: {0}")]
    MaxRetriesExceeded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
