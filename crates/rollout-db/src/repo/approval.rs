//! The `approval_requests` table backing `ApprovalService` (spec §4.5).

use crate::{DbError, DbResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollout_core::{ApprovalId, ApprovalRequest, ApprovalStatus, Environment, ExecutionId, ModuleRef};
use sqlx::PgPool;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    execution_id: uuid::Uuid,
    approval_id: uuid::Uuid,
    requester_email: String,
    environment: String,
    module_name: String,
    module_version: String,
    status: String,
    approver_emails: Vec<String>,
    requested_at: DateTime<Utc>,
    timeout_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
    responded_by_email: Option<String>,
    response_reason: Option<String>,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = DbError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        let environment = Environment::from_str(&row.environment)
            .map_err(|e| DbError::Database(sqlx::Error::Decode(Box::new(e))))?;
        let status = match row.status.as_str() {
            "pending" => ApprovalStatus::Pending,
            "approved" => ApprovalStatus::Approved,
            "rejected" => ApprovalStatus::Rejected,
            "expired" => ApprovalStatus::Expired,
            other => {
                return Err(DbError::Database(sqlx::Error::Decode(
                    format!("unknown approval status: {other}").into(),
                )))
            }
        };
        Ok(ApprovalRequest {
            execution_id: ExecutionId::from_uuid(row.execution_id),
            approval_id: ApprovalId::from_uuid(row.approval_id),
            requester_email: row.requester_email,
            environment,
            module: ModuleRef::new(row.module_name, row.module_version),
            status,
            approver_emails: row.approver_emails,
            requested_at: row.requested_at,
            timeout_at: row.timeout_at,
            responded_at: row.responded_at,
            responded_by_email: row.responded_by_email,
            response_reason: row.response_reason,
        })
    }
}

#[async_trait]
pub trait ApprovalRepo: Send + Sync {
    async fn create(&self, request: &ApprovalRequest) -> DbResult<ApprovalRequest>;
    async fn get(&self, execution_id: ExecutionId) -> DbResult<ApprovalRequest>;
    /// Transition a `pending` row to `approved`/`rejected`. Returns
    /// `Ok(None)` if the row was not pending (caller maps this to
    /// `AlreadyDecided`).
    async fn decide(
        &self,
        execution_id: ExecutionId,
        approved: bool,
        responder_email: &str,
        reason: Option<&str>,
    ) -> DbResult<Option<ApprovalRequest>>;
    /// Expire every `pending` row whose `timeout_at` has passed. Returns the
    /// rows that were transitioned.
    async fn expire_due(&self) -> DbResult<Vec<ApprovalRequest>>;
}

pub struct PgApprovalRepo {
    pool: PgPool,
}

impl PgApprovalRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalRepo for PgApprovalRepo {
    async fn create(&self, request: &ApprovalRequest) -> DbResult<ApprovalRequest> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            r#"
            INSERT INTO approval_requests
                (execution_id, approval_id, requester_email, environment,
                 module_name, module_version, status, approver_emails,
                 requested_at, timeout_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(request.execution_id.as_uuid())
        .bind(request.approval_id.as_uuid())
        .bind(&request.requester_email)
        .bind(request.environment.to_string())
        .bind(&request.module.name)
        .bind(&request.module.version)
        .bind(&request.approver_emails)
        .bind(request.requested_at)
        .bind(request.timeout_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get(&self, execution_id: ExecutionId) -> DbResult<ApprovalRequest> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            "SELECT * FROM approval_requests WHERE execution_id = $1",
        )
        .bind(execution_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("approval request {execution_id}")))?;
        row.try_into()
    }

    async fn decide(
        &self,
        execution_id: ExecutionId,
        approved: bool,
        responder_email: &str,
        reason: Option<&str>,
    ) -> DbResult<Option<ApprovalRequest>> {
        let new_status = if approved { "approved" } else { "rejected" };
        let row = sqlx::query_as::<_, ApprovalRow>(
            r#"
            UPDATE approval_requests
            SET status = $2,
                responded_at = now(),
                responded_by_email = $3,
                response_reason = $4
            WHERE execution_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(execution_id.as_uuid())
        .bind(new_status)
        .bind(responder_email)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn expire_due(&self) -> DbResult<Vec<ApprovalRequest>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            r#"
            UPDATE approval_requests
            SET status = 'expired', responded_at = now()
            WHERE status = 'pending' AND timeout_at <= now()
            RETURNING *
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
