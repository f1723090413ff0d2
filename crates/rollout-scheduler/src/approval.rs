//! The approval gate a pipeline parks in when `RequireApproval` is set
//! (spec §4.5).

use chrono::{Duration as ChronoDuration, Utc};
use rollout_core::events::names;
use rollout_core::{
    ApprovalId, ApprovalRequest, ApprovalStatus, Environment, Error, Event, EventSink,
    ExecutionContext, ExecutionId, ModuleRef, Result,
};
use rollout_db::ApprovalRepo;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ApprovalService {
    repo: Arc<dyn ApprovalRepo>,
    events: Arc<dyn EventSink>,
}

impl ApprovalService {
    pub fn new(repo: Arc<dyn ApprovalRepo>, events: Arc<dyn EventSink>) -> Self {
        Self { repo, events }
    }

    pub async fn request_approval(
        &self,
        execution_id: ExecutionId,
        requester_email: &str,
        environment: Environment,
        module: ModuleRef,
        approver_emails: Vec<String>,
        timeout: Duration,
    ) -> Result<ApprovalRequest> {
        let now = Utc::now();
        let request = ApprovalRequest {
            execution_id,
            approval_id: ApprovalId::new(),
            requester_email: requester_email.to_string(),
            environment,
            module,
            status: ApprovalStatus::Pending,
            approver_emails,
            requested_at: now,
            timeout_at: now + to_chrono(timeout),
            responded_at: None,
            responded_by_email: None,
            response_reason: None,
        };
        let created = self.repo.create(&request).await?;
        self.events
            .publish(Event::for_approval(
                names::APPROVAL_REQUESTED,
                execution_id,
                created.approval_id,
                json!({ "timeout_at": created.timeout_at }),
            ))
            .await;
        Ok(created)
    }

    /// Block until the approval for `execution_id` reaches a terminal
    /// status, polling at [`POLL_INTERVAL`] (well within the spec's "must
    /// wake promptly, 1s polling acceptable" bound).
    pub async fn wait_for_approval(
        &self,
        execution_id: ExecutionId,
        ctx: &ExecutionContext,
    ) -> Result<ApprovalRequest> {
        loop {
            let request = self.repo.get(execution_id).await?;
            if request.status.is_terminal() {
                return Ok(request);
            }
            if ctx.sleep_or_cancel(POLL_INTERVAL).await {
                return Err(Error::Cancelled);
            }
        }
    }

    pub async fn approve(
        &self,
        execution_id: ExecutionId,
        approver_email: &str,
        reason: Option<&str>,
    ) -> Result<ApprovalRequest> {
        self.decide(execution_id, true, approver_email, reason)
            .await
    }

    pub async fn reject(
        &self,
        execution_id: ExecutionId,
        approver_email: &str,
        reason: Option<&str>,
    ) -> Result<ApprovalRequest> {
        self.decide(execution_id, false, approver_email, reason)
            .await
    }

    async fn decide(
        &self,
        execution_id: ExecutionId,
        approved: bool,
        approver_email: &str,
        reason: Option<&str>,
    ) -> Result<ApprovalRequest> {
        let current = self.repo.get(execution_id).await?;
        if !current.approver_emails.iter().any(|e| e == approver_email) {
            return Err(Error::ApprovalNotAuthorized(approver_email.to_string()));
        }
        if current.status != ApprovalStatus::Pending {
            return Err(Error::ApprovalAlreadyDecided);
        }

        let decided = self
            .repo
            .decide(execution_id, approved, approver_email, reason)
            .await?
            .ok_or(Error::ApprovalAlreadyDecided)?;

        let event_name = if approved {
            names::APPROVAL_GRANTED
        } else {
            names::APPROVAL_REJECTED
        };
        self.events
            .publish(Event::for_approval(
                event_name,
                execution_id,
                decided.approval_id,
                json!({ "responder": approver_email, "reason": reason }),
            ))
            .await;
        Ok(decided)
    }

    /// Transition every `pending` row past its `timeout_at` to `expired`.
    /// Run on a periodic interval by the job processor's background loop.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let expired = self.repo.expire_due().await?;
        for request in &expired {
            self.events
                .publish(Event::for_approval(
                    names::APPROVAL_EXPIRED,
                    request.execution_id,
                    request.approval_id,
                    json!({ "timeout_at": request.timeout_at }),
                ))
                .await;
        }
        Ok(expired.len())
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::zero())
}
