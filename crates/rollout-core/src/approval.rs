//! The approval gate's durable state.

use crate::id::{ApprovalId, ExecutionId};
use crate::module::ModuleRef;
use crate::Environment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// A pending or decided approval gate for one deployment execution.
/// `execution_id` is the primary key — at most one approval request exists
/// per execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub execution_id: ExecutionId,
    pub approval_id: ApprovalId,
    pub requester_email: String,
    pub environment: Environment,
    pub module: ModuleRef,
    pub status: ApprovalStatus,
    pub approver_emails: Vec<String>,
    pub requested_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by_email: Option<String>,
    pub response_reason: Option<String>,
}

impl ApprovalRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && self.timeout_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending_request(timeout_at: DateTime<Utc>) -> ApprovalRequest {
        ApprovalRequest {
            execution_id: ExecutionId::new(),
            approval_id: ApprovalId::new(),
            requester_email: "dev@example.com".to_string(),
            environment: Environment::Production,
            module: ModuleRef::new("checkout", "1.0.0"),
            status: ApprovalStatus::Pending,
            approver_emails: vec!["lead@example.com".to_string()],
            requested_at: Utc::now(),
            timeout_at,
            responded_at: None,
            responded_by_email: None,
            response_reason: None,
        }
    }

    #[test]
    fn pending_past_timeout_is_expired() {
        let request = pending_request(Utc::now() - Duration::seconds(1));
        assert!(request.is_expired(Utc::now()));
    }

    #[test]
    fn pending_before_timeout_is_not_expired() {
        let request = pending_request(Utc::now() + Duration::hours(1));
        assert!(!request.is_expired(Utc::now()));
    }

    #[test]
    fn decided_request_is_never_expired_even_past_timeout() {
        let mut request = pending_request(Utc::now() - Duration::seconds(1));
        request.status = ApprovalStatus::Approved;
        assert!(!request.is_expired(Utc::now()));
    }
}
