//! Claims `deployment_jobs` rows and drives each through the
//! `PipelineOrchestrator` (spec §4.7), including lease-orphan recovery and
//! the approval-expiry sweep.

use crate::approval::ApprovalService;
use crate::orchestrator::{Outcome, PipelineOrchestrator};
use rollout_config::OrchestratorConfig;
use rollout_core::ExecutionContext;
use rollout_db::DeploymentJobRepo;
use std::sync::Arc;
use std::time::Duration;

pub struct JobProcessor {
    jobs: Arc<dyn DeploymentJobRepo>,
    orchestrator: Arc<PipelineOrchestrator>,
    approvals: Arc<ApprovalService>,
    instance_id: String,
    config: OrchestratorConfig,
}

impl JobProcessor {
    pub fn new(
        jobs: Arc<dyn DeploymentJobRepo>,
        orchestrator: Arc<PipelineOrchestrator>,
        approvals: Arc<ApprovalService>,
        instance_id: String,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            jobs,
            orchestrator,
            approvals,
            instance_id,
            config,
        }
    }

    /// Run the claim/execute/sleep loop until `ctx` is cancelled.
    pub async fn run(&self, ctx: &ExecutionContext) {
        loop {
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "job processor tick failed");
            }
            if ctx.sleep_or_cancel(self.config.job_poll_interval).await {
                tracing::info!("job processor stopping");
                return;
            }
        }
    }

    /// One iteration: recover orphaned leases, sweep expired approvals and
    /// stale tracker entries, then claim and run up to `max_concurrent_jobs`
    /// rows in parallel.
    pub async fn tick(&self) -> rollout_core::Result<()> {
        self.recover_orphans().await?;

        if let Err(e) = self.approvals.sweep_expired().await {
            tracing::warn!(error = %e, "approval expiry sweep failed");
        }

        self.orchestrator.tracker().evict_expired();

        let mut claimed = Vec::new();
        for _ in 0..self.config.max_concurrent_jobs {
            match self
                .jobs
                .claim(&self.instance_id, self.config.job_lease_duration)
                .await?
            {
                Some(job) => claimed.push(job),
                None => break,
            }
        }

        if claimed.is_empty() {
            return Ok(());
        }

        let futures = claimed.into_iter().map(|job| async move {
            let ctx = ExecutionContext::new();
            let retry_count = job.retry_count;
            let execution_id = job.payload.execution_id;
            match self.orchestrator.execute(&job, &ctx).await {
                Ok(Outcome::Succeeded(_)) => {
                    tracing::info!(%execution_id, "deployment job succeeded");
                }
                Ok(Outcome::Failed { reason }) => {
                    tracing::warn!(%execution_id, reason, "deployment job failed");
                }
                Ok(Outcome::Cancelled) => {
                    tracing::info!(%execution_id, "deployment job cancelled");
                }
                Err(e) => {
                    tracing::error!(%execution_id, error = %e, "deployment job processor exception");
                    let backoff = backoff_for(retry_count + 1);
                    if let Err(e) = self.jobs.fail(job.id, &e.to_string(), backoff).await {
                        tracing::error!(%execution_id, error = %e, "failed to record job failure");
                    }
                }
            }
        });

        futures::future::join_all(futures).await;
        Ok(())
    }

    async fn recover_orphans(&self) -> rollout_core::Result<()> {
        let orphaned = self.jobs.find_orphaned().await?;
        for job in orphaned {
            let backoff = backoff_for(job.retry_count + 1);
            if let Err(e) = self
                .jobs
                .fail(job.id, "job lease orphaned", backoff)
                .await
            {
                tracing::error!(
                    execution_id = %job.payload.execution_id,
                    error = %e,
                    "failed to record orphaned lease"
                );
            }
        }
        Ok(())
    }
}

/// Exponential backoff: `2^retry_count` minutes, per spec §4.7. Callers pass
/// the post-increment retry count (the value `retry_count` will hold once
/// `fail()`'s own `retry_count = retry_count + 1` lands), so the first retry
/// waits 2 minutes, the second 4, and so on.
fn backoff_for(retry_count: i32) -> Duration {
    let minutes = 2u64.saturating_pow(retry_count.max(0) as u32);
    Duration::from_secs(minutes.saturating_mul(60))
}
