//! The `deployment_jobs` outbox/lease table (spec §4.7).

use crate::{DbError, DbResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollout_core::{DeploymentJob, DeploymentRequest, ExecutionId, JobStatus};
use sqlx::PgPool;
use std::time::Duration;

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    execution_id: uuid::Uuid,
    payload: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    retry_count: i32,
    max_retries: i32,
    next_retry_at: Option<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
    processing_instance: Option<String>,
    error_message: Option<String>,
}

impl TryFrom<JobRow> for DeploymentJob {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let payload: DeploymentRequest = serde_json::from_value(row.payload)
            .map_err(|e| DbError::Database(sqlx::Error::Decode(Box::new(e))))?;
        let status = match row.status.as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "succeeded" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            other => {
                return Err(DbError::Database(sqlx::Error::Decode(
                    format!("unknown job status: {other}").into(),
                )))
            }
        };
        Ok(DeploymentJob {
            id: row.id,
            execution_id: ExecutionId::from_uuid(row.execution_id),
            payload,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            next_retry_at: row.next_retry_at,
            locked_until: row.locked_until,
            processing_instance: row.processing_instance,
            error_message: row.error_message,
        })
    }
}

#[async_trait]
pub trait DeploymentJobRepo: Send + Sync {
    async fn enqueue(&self, request: &DeploymentRequest, max_retries: i32) -> DbResult<DeploymentJob>;
    async fn get(&self, execution_id: ExecutionId) -> DbResult<DeploymentJob>;
    /// Claim one claimable row (`pending`/retry-eligible `failed`, ordered
    /// oldest first) for `instance_id`, leasing it for `lease`.
    async fn claim(&self, instance_id: &str, lease: Duration) -> DbResult<Option<DeploymentJob>>;
    async fn complete(&self, id: i64) -> DbResult<()>;
    /// The orchestrator's own terminal verdict for a row it ran to
    /// completion (`Succeeded`/`Failed`/`Cancelled` as business outcomes,
    /// not crashes). Bypasses the retry/backoff machinery entirely —
    /// `fail` below is for the processor's own exceptions.
    async fn mark_terminal(
        &self,
        id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> DbResult<()>;
    /// Record a failure. If retries remain, the row returns to `pending`
    /// with `next_retry_at` pushed out by `backoff`; otherwise it becomes
    /// terminally `failed`.
    async fn fail(&self, id: i64, error_message: &str, backoff: Duration) -> DbResult<()>;
    /// Rows `running` whose lease has expired — the orphan-recovery sweep.
    async fn find_orphaned(&self) -> DbResult<Vec<DeploymentJob>>;
    /// The most recently created rows, newest first — backs `GET /deployments`.
    async fn list_recent(&self, limit: i64) -> DbResult<Vec<DeploymentJob>>;
}

pub struct PgDeploymentJobRepo {
    pool: PgPool,
}

impl PgDeploymentJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentJobRepo for PgDeploymentJobRepo {
    async fn enqueue(&self, request: &DeploymentRequest, max_retries: i32) -> DbResult<DeploymentJob> {
        let payload = serde_json::to_value(request)
            .map_err(|e| DbError::Database(sqlx::Error::Encode(Box::new(e))))?;
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO deployment_jobs (execution_id, payload, status, max_retries)
            VALUES ($1, $2, 'pending', $3)
            RETURNING *
            "#,
        )
        .bind(request.execution_id.as_uuid())
        .bind(payload)
        .bind(max_retries)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get(&self, execution_id: ExecutionId) -> DbResult<DeploymentJob> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM deployment_jobs WHERE execution_id = $1")
            .bind(execution_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("deployment job {execution_id}")))?;
        row.try_into()
    }

    async fn claim(&self, instance_id: &str, lease: Duration) -> DbResult<Option<DeploymentJob>> {
        let lease_seconds = lease.as_secs() as f64;
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE deployment_jobs
            SET status = 'running',
                started_at = COALESCE(started_at, now()),
                locked_until = now() + make_interval(secs => $2),
                processing_instance = $1
            WHERE id = (
                SELECT id FROM deployment_jobs
                WHERE status IN ('pending', 'failed')
                  AND (next_retry_at IS NULL OR next_retry_at <= now())
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(instance_id)
        .bind(lease_seconds)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn complete(&self, id: i64) -> DbResult<()> {
        sqlx::query(
            "UPDATE deployment_jobs SET status = 'succeeded', completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_terminal(
        &self,
        id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> DbResult<()> {
        let status = match status {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Pending | JobStatus::Running => {
                return Err(DbError::Database(sqlx::Error::Decode(
                    "mark_terminal requires a terminal status".into(),
                )))
            }
        };
        sqlx::query(
            r#"
            UPDATE deployment_jobs
            SET status = $2,
                completed_at = now(),
                locked_until = NULL,
                processing_instance = NULL,
                error_message = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: i64, error_message: &str, backoff: Duration) -> DbResult<()> {
        let backoff_seconds = backoff.as_secs_f64();
        sqlx::query(
            r#"
            UPDATE deployment_jobs
            SET retry_count = retry_count + 1,
                error_message = $2,
                locked_until = NULL,
                processing_instance = NULL,
                status = CASE
                    WHEN retry_count + 1 < max_retries THEN 'pending'
                    ELSE 'failed'
                END,
                next_retry_at = CASE
                    WHEN retry_count + 1 < max_retries THEN now() + make_interval(secs => $3)
                    ELSE NULL
                END,
                completed_at = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE now()
                END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(backoff_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_orphaned(&self) -> DbResult<Vec<DeploymentJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM deployment_jobs WHERE status = 'running' AND locked_until < now()",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_recent(&self, limit: i64) -> DbResult<Vec<DeploymentJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM deployment_jobs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
