//! `PipelineOrchestrator`: the `Created -> ... -> {Succeeded, Failed,
//! Cancelled}` state machine that drives a single deployment end to end
//! (spec §4.6).

use crate::approval::ApprovalService;
use crate::tracker::DeploymentTracker;
use rollout_config::OrchestratorConfig;
use rollout_core::events::names;
use rollout_core::node::NodeAgent;
use rollout_core::{
    ClusterRegistry, DeploymentJob, Environment, Error, Event, EventSink, ExecutionContext,
    ExecutionId, PipelineStatus, Result, StageStatus,
};
use rollout_coordination::{DistributedLock, IdempotencyStore};
use rollout_db::DeploymentJobRepo;
use rollout_strategy::{executor_for, CanaryAnalyzer, DeploymentResult, MetricsProvider};
use serde_json::json;
use std::sync::Arc;

/// What running a pipeline to completion settled on. `Outcome::is_success`
/// maps straight onto `JobStatus` via [`DeploymentJobRepo::mark_terminal`],
/// which the orchestrator has already called by the time this is returned —
/// the job processor only needs this to decide what to log and return to
/// the caller, not to write the row itself.
#[derive(Debug)]
pub enum Outcome {
    Succeeded(DeploymentResult),
    Failed { reason: String },
    Cancelled,
}

pub struct PipelineOrchestrator {
    clusters: ClusterRegistry,
    lock: Arc<dyn DistributedLock>,
    idempotency: Arc<dyn IdempotencyStore>,
    jobs: Arc<dyn DeploymentJobRepo>,
    approvals: Arc<ApprovalService>,
    tracker: DeploymentTracker,
    events: Arc<dyn EventSink>,
    node_agent: Arc<dyn NodeAgent>,
    metrics: Option<Arc<dyn MetricsProvider>>,
    canary_analyzer: Arc<dyn CanaryAnalyzer>,
    config: OrchestratorConfig,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clusters: ClusterRegistry,
        lock: Arc<dyn DistributedLock>,
        idempotency: Arc<dyn IdempotencyStore>,
        jobs: Arc<dyn DeploymentJobRepo>,
        approvals: Arc<ApprovalService>,
        tracker: DeploymentTracker,
        events: Arc<dyn EventSink>,
        node_agent: Arc<dyn NodeAgent>,
        metrics: Option<Arc<dyn MetricsProvider>>,
        canary_analyzer: Arc<dyn CanaryAnalyzer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            clusters,
            lock,
            idempotency,
            jobs,
            approvals,
            tracker,
            events,
            node_agent,
            metrics,
            canary_analyzer,
            config,
        }
    }

    pub fn tracker(&self) -> &DeploymentTracker {
        &self.tracker
    }

    /// Run one claimed job row to a terminal outcome. `Ok` means the job row
    /// has already been written to a terminal status (`mark_terminal`) and
    /// the caller only needs to report the result — it is not an exception
    /// for the job processor's retry machinery. `Err` means something
    /// unexpected happened before a verdict could be reached (e.g. the
    /// database went away); the caller should treat that as the processor
    /// exception path (`fail`, with backoff).
    pub async fn execute(&self, job: &DeploymentJob, ctx: &ExecutionContext) -> Result<Outcome> {
        let request = &job.payload;
        let execution_id = request.execution_id;
        self.tracker.create(execution_id);

        self.tracker.set_status(execution_id, PipelineStatus::Validating);
        self.tracker.start_stage(execution_id, "Validating");
        if let Err(e) = request.validate() {
            return self.fail_without_lock(job, execution_id, e, None).await;
        }

        let cluster = match self.clusters.get(request.environment) {
            Ok(cluster) if !cluster.is_empty() => cluster,
            Ok(_) => {
                let e = Error::InvalidRequest(format!(
                    "cluster for {} has no nodes",
                    request.environment
                ));
                return self.fail_without_lock(job, execution_id, e, None).await;
            }
            Err(e) => return self.fail_without_lock(job, execution_id, e, None).await,
        };
        self.tracker.finish_current_stage(
            execution_id,
            StageStatus::Succeeded,
            None,
            None,
            None,
        );

        self.events
            .publish(Event::new(names::DEPLOYMENT_STARTED, execution_id, json!({
                "module": request.module.to_string(),
                "environment": request.environment.to_string(),
                "strategy": request.strategy.to_string(),
            })))
            .await;

        if request.require_approval {
            match self.await_approval(job, &request.environment, ctx).await? {
                ApprovalOutcome::Approved => {}
                ApprovalOutcome::Failed(e) => {
                    return self.fail_without_lock(job, execution_id, e, None).await;
                }
                ApprovalOutcome::Cancelled => {
                    return self.cancel(job, execution_id, None).await;
                }
            }
        }

        self.tracker.set_status(execution_id, PipelineStatus::Acquiring);
        self.tracker.start_stage(execution_id, "Acquiring");
        let resource = format!("deploy:{}:{}", request.environment, request.module.name);
        let guard = match self
            .lock
            .acquire(&resource, self.config.lock_acquire_timeout, ctx)
            .await
        {
            Ok(guard) => guard,
            Err(Error::Cancelled) => return self.cancel(job, execution_id, None).await,
            Err(e) => return self.fail_without_lock(job, execution_id, e, None).await,
        };
        self.tracker.finish_current_stage(
            execution_id,
            StageStatus::Succeeded,
            None,
            None,
            None,
        );

        self.tracker.set_status(execution_id, PipelineStatus::Executing);
        self.tracker
            .start_stage(execution_id, request.strategy.to_string());
        let executor = executor_for(
            request.strategy,
            self.config.strategy.clone(),
            self.metrics.clone(),
            self.canary_analyzer.clone(),
        );
        let result = executor
            .deploy(request, &cluster, self.node_agent.as_ref(), ctx)
            .await;
        let deployed = result.node_results.iter().filter(|r| r.success).count() as u32;
        let failed = result.node_results.len() as u32 - deployed;
        self.tracker.finish_current_stage(
            execution_id,
            if result.success {
                StageStatus::Succeeded
            } else {
                StageStatus::Failed
            },
            Some(deployed),
            Some(failed),
            Some(result.message.clone()),
        );

        guard.release().await;

        if ctx.is_cancelled() {
            return self.cancel(job, execution_id, Some(result)).await;
        }

        self.finalize(job, execution_id, result).await
    }

    async fn await_approval(
        &self,
        job: &DeploymentJob,
        environment: &Environment,
        ctx: &ExecutionContext,
    ) -> Result<ApprovalOutcome> {
        let request = &job.payload;
        let execution_id = request.execution_id;
        self.tracker
            .set_status(execution_id, PipelineStatus::AwaitingApproval);
        self.tracker.start_stage(execution_id, "Approval");

        let approvers = self.config.default_approver_emails.clone();
        self.approvals
            .request_approval(
                execution_id,
                &request.requester_email,
                *environment,
                request.module.clone(),
                approvers,
                self.config.default_approval_timeout,
            )
            .await?;

        let decided = match self.approvals.wait_for_approval(execution_id, ctx).await {
            Ok(decided) => decided,
            Err(Error::Cancelled) => {
                self.tracker.finish_current_stage(
                    execution_id,
                    StageStatus::Failed,
                    None,
                    None,
                    Some("cancelled while awaiting approval".into()),
                );
                return Ok(ApprovalOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        use rollout_core::ApprovalStatus as S;
        match decided.status {
            S::Approved => {
                self.tracker.finish_current_stage(
                    execution_id,
                    StageStatus::Succeeded,
                    None,
                    None,
                    None,
                );
                Ok(ApprovalOutcome::Approved)
            }
            S::Rejected => {
                let reason = decided.response_reason.unwrap_or_default();
                self.tracker.finish_current_stage(
                    execution_id,
                    StageStatus::Failed,
                    None,
                    None,
                    Some(format!("rejected: {reason}")),
                );
                Ok(ApprovalOutcome::Failed(Error::ApprovalRejected {
                    responder: decided.responded_by_email.unwrap_or_default(),
                    reason,
                }))
            }
            S::Expired => {
                self.tracker.finish_current_stage(
                    execution_id,
                    StageStatus::Failed,
                    None,
                    None,
                    Some("approval expired".into()),
                );
                Ok(ApprovalOutcome::Failed(Error::ApprovalExpired {
                    timeout_at: decided.timeout_at,
                }))
            }
            S::Pending => unreachable!("wait_for_approval only returns terminal statuses"),
        }
    }

    async fn finalize(
        &self,
        job: &DeploymentJob,
        execution_id: ExecutionId,
        result: DeploymentResult,
    ) -> Result<Outcome> {
        self.tracker
            .set_status(execution_id, PipelineStatus::Finalizing);
        self.tracker.start_stage(execution_id, "Finalizing");

        let terminal_key = format!("terminal-event:{execution_id}");
        let should_emit = self.idempotency.claim(&terminal_key).await.unwrap_or(true);

        if result.success {
            self.jobs
                .mark_terminal(job.id, rollout_core::JobStatus::Succeeded, None)
                .await?;
            self.tracker
                .set_status(execution_id, PipelineStatus::Succeeded);
            self.tracker.finish_current_stage(
                execution_id,
                StageStatus::Succeeded,
                None,
                None,
                None,
            );
            if should_emit {
                self.events
                    .publish(Event::new(
                        names::DEPLOYMENT_SUCCEEDED,
                        execution_id,
                        json!({ "message": result.message }),
                    ))
                    .await;
            }
            Ok(Outcome::Succeeded(result))
        } else {
            self.jobs
                .mark_terminal(
                    job.id,
                    rollout_core::JobStatus::Failed,
                    Some(&result.message),
                )
                .await?;
            self.tracker.set_status(execution_id, PipelineStatus::Failed);
            self.tracker.finish_current_stage(
                execution_id,
                StageStatus::Failed,
                None,
                None,
                Some(result.message.clone()),
            );
            if should_emit {
                self.events
                    .publish(Event::new(
                        names::DEPLOYMENT_FAILED,
                        execution_id,
                        json!({ "message": result.message }),
                    ))
                    .await;
            }
            Ok(Outcome::Failed {
                reason: result.message,
            })
        }
    }

    /// A terminal failure reached before (or without) acquiring the lock —
    /// validation, cluster resolution, approval rejection/expiry, or lock
    /// timeout. Never an exception: this is a business verdict.
    async fn fail_without_lock(
        &self,
        job: &DeploymentJob,
        execution_id: ExecutionId,
        error: Error,
        stage_message: Option<String>,
    ) -> Result<Outcome> {
        let message = stage_message.unwrap_or_else(|| error.to_string());
        self.tracker.finish_current_stage(
            execution_id,
            StageStatus::Failed,
            None,
            None,
            Some(message.clone()),
        );
        self.tracker.set_status(execution_id, PipelineStatus::Failed);
        self.jobs
            .mark_terminal(job.id, rollout_core::JobStatus::Failed, Some(&message))
            .await?;
        self.events
            .publish(Event::new(
                names::DEPLOYMENT_FAILED,
                execution_id,
                json!({ "message": message }),
            ))
            .await;
        Ok(Outcome::Failed { reason: message })
    }

    async fn cancel(
        &self,
        job: &DeploymentJob,
        execution_id: ExecutionId,
        result: Option<DeploymentResult>,
    ) -> Result<Outcome> {
        self.tracker
            .set_status(execution_id, PipelineStatus::Cancelled);
        let message = result
            .as_ref()
            .map(|r| r.message.clone())
            .unwrap_or_else(|| "cancelled".to_string());
        self.tracker.finish_current_stage(
            execution_id,
            StageStatus::Failed,
            None,
            None,
            Some(message.clone()),
        );
        self.jobs
            .mark_terminal(job.id, rollout_core::JobStatus::Cancelled, Some(&message))
            .await?;
        self.events
            .publish(Event::new(names::DEPLOYMENT_CANCELLED, execution_id, json!({})))
            .await;
        Ok(Outcome::Cancelled)
    }
}

enum ApprovalOutcome {
    Approved,
    Failed(Error),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rollout_coordination::{InMemoryIdempotencyStore, InProcessLock};
    use rollout_core::{ApprovalRequest, Node, TracingEventSink};
    use rollout_cluster::InMemoryNodeAgent;
    use rollout_db::{ApprovalRepo, DbError, DbResult};
    use rollout_strategy::{ErrorRateCanaryAnalyzer, StaticMetricsProvider};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct InMemoryJobRepo {
        jobs: StdMutex<HashMap<i64, DeploymentJob>>,
        next_id: StdMutex<i64>,
    }

    #[async_trait]
    impl DeploymentJobRepo for InMemoryJobRepo {
        async fn enqueue(
            &self,
            request: &rollout_core::DeploymentRequest,
            max_retries: i32,
        ) -> DbResult<DeploymentJob> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let job = DeploymentJob {
                id: *next_id,
                execution_id: request.execution_id,
                payload: request.clone(),
                status: rollout_core::JobStatus::Pending,
                created_at: chrono::Utc::now(),
                started_at: None,
                completed_at: None,
                retry_count: 0,
                max_retries,
                next_retry_at: None,
                locked_until: None,
                processing_instance: None,
                error_message: None,
            };
            self.jobs.lock().unwrap().insert(job.id, job.clone());
            Ok(job)
        }

        async fn get(&self, execution_id: ExecutionId) -> DbResult<DeploymentJob> {
            self.jobs
                .lock()
                .unwrap()
                .values()
                .find(|j| j.execution_id == execution_id)
                .cloned()
                .ok_or_else(|| DbError::NotFound(execution_id.to_string()))
        }

        async fn claim(&self, _instance_id: &str, _lease: Duration) -> DbResult<Option<DeploymentJob>> {
            unimplemented!("not exercised by orchestrator tests")
        }

        async fn complete(&self, _id: i64) -> DbResult<()> {
            unimplemented!("not exercised by orchestrator tests")
        }

        async fn mark_terminal(
            &self,
            id: i64,
            status: rollout_core::JobStatus,
            error_message: Option<&str>,
        ) -> DbResult<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.get_mut(&id).expect("job exists");
            job.status = status;
            job.error_message = error_message.map(str::to_string);
            job.completed_at = Some(chrono::Utc::now());
            Ok(())
        }

        async fn fail(&self, _id: i64, _error_message: &str, _backoff: Duration) -> DbResult<()> {
            unimplemented!("not exercised by orchestrator tests")
        }

        async fn find_orphaned(&self) -> DbResult<Vec<DeploymentJob>> {
            Ok(Vec::new())
        }

        async fn list_recent(&self, _limit: i64) -> DbResult<Vec<DeploymentJob>> {
            Ok(self.jobs.lock().unwrap().values().cloned().collect())
        }
    }

    #[derive(Default)]
    struct InMemoryApprovalRepo {
        requests: StdMutex<HashMap<ExecutionId, ApprovalRequest>>,
    }

    #[async_trait]
    impl ApprovalRepo for InMemoryApprovalRepo {
        async fn create(&self, request: &ApprovalRequest) -> DbResult<ApprovalRequest> {
            self.requests
                .lock()
                .unwrap()
                .insert(request.execution_id, request.clone());
            Ok(request.clone())
        }

        async fn get(&self, execution_id: ExecutionId) -> DbResult<ApprovalRequest> {
            self.requests
                .lock()
                .unwrap()
                .get(&execution_id)
                .cloned()
                .ok_or_else(|| DbError::NotFound(execution_id.to_string()))
        }

        async fn decide(
            &self,
            execution_id: ExecutionId,
            approved: bool,
            responder_email: &str,
            reason: Option<&str>,
        ) -> DbResult<Option<ApprovalRequest>> {
            let mut requests = self.requests.lock().unwrap();
            let request = requests.get_mut(&execution_id).expect("request exists");
            if request.status != rollout_core::ApprovalStatus::Pending {
                return Ok(None);
            }
            request.status = if approved {
                rollout_core::ApprovalStatus::Approved
            } else {
                rollout_core::ApprovalStatus::Rejected
            };
            request.responded_at = Some(chrono::Utc::now());
            request.responded_by_email = Some(responder_email.to_string());
            request.response_reason = reason.map(str::to_string);
            Ok(Some(request.clone()))
        }

        async fn expire_due(&self) -> DbResult<Vec<ApprovalRequest>> {
            Ok(Vec::new())
        }
    }

    fn test_cluster() -> ClusterRegistry {
        let registry = ClusterRegistry::new();
        registry.register(rollout_core::EnvironmentCluster::new(
            Environment::Staging,
            vec![Node::new("node-a", 8080, Environment::Staging)],
        ));
        registry
    }

    #[allow(clippy::too_many_arguments)]
    fn test_orchestrator(
        jobs: Arc<dyn DeploymentJobRepo>,
        approvals_repo: Arc<dyn ApprovalRepo>,
    ) -> PipelineOrchestrator {
        let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        let approvals = Arc::new(ApprovalService::new(approvals_repo, events.clone()));
        PipelineOrchestrator::new(
            test_cluster(),
            Arc::new(InProcessLock::new()),
            Arc::new(InMemoryIdempotencyStore::new(Duration::from_secs(60))),
            jobs,
            approvals,
            DeploymentTracker::new(),
            events,
            Arc::new(InMemoryNodeAgent::new()),
            Some(Arc::new(StaticMetricsProvider::default())),
            Arc::new(ErrorRateCanaryAnalyzer::new(0.05)),
            OrchestratorConfig::default(),
        )
    }

    fn test_request(environment: Environment, require_approval: bool) -> rollout_core::DeploymentRequest {
        rollout_core::DeploymentRequest {
            execution_id: ExecutionId::new(),
            module: rollout_core::ModuleRef::new("checkout", "1.0.0"),
            environment,
            strategy: rollout_core::StrategyKind::Direct,
            require_approval,
            requester_email: "dev@example.com".to_string(),
            description: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn direct_strategy_succeeds_without_approval() {
        let jobs: Arc<dyn DeploymentJobRepo> = Arc::new(InMemoryJobRepo::default());
        let approvals_repo: Arc<dyn ApprovalRepo> = Arc::new(InMemoryApprovalRepo::default());
        let orchestrator = test_orchestrator(jobs.clone(), approvals_repo);

        let request = test_request(Environment::Staging, false);
        let job = jobs.enqueue(&request, 3).await.unwrap();
        let ctx = ExecutionContext::new();

        let outcome = orchestrator.execute(&job, &ctx).await.unwrap();
        assert!(matches!(outcome, Outcome::Succeeded(_)));

        let stored = jobs.get(request.execution_id).await.unwrap();
        assert_eq!(stored.status, rollout_core::JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn unknown_environment_fails_without_exception() {
        let jobs: Arc<dyn DeploymentJobRepo> = Arc::new(InMemoryJobRepo::default());
        let approvals_repo: Arc<dyn ApprovalRepo> = Arc::new(InMemoryApprovalRepo::default());
        let orchestrator = test_orchestrator(jobs.clone(), approvals_repo);

        let request = test_request(Environment::Production, false);
        let job = jobs.enqueue(&request, 3).await.unwrap();
        let ctx = ExecutionContext::new();

        let outcome = orchestrator.execute(&job, &ctx).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { .. }));
        let stored = jobs.get(request.execution_id).await.unwrap();
        assert_eq!(stored.status, rollout_core::JobStatus::Failed);
    }

    #[tokio::test]
    async fn rejected_approval_fails_the_pipeline() {
        let jobs: Arc<dyn DeploymentJobRepo> = Arc::new(InMemoryJobRepo::default());
        let approvals_repo: Arc<dyn ApprovalRepo> = Arc::new(InMemoryApprovalRepo::default());
        let orchestrator = test_orchestrator(jobs.clone(), approvals_repo.clone());

        let request = test_request(Environment::Staging, true);
        let job = jobs.enqueue(&request, 3).await.unwrap();
        let ctx = ExecutionContext::new();

        let execution_id = request.execution_id;
        let running = tokio::spawn(async move { orchestrator.execute(&job, &ctx).await });

        // Wait for the approval row to exist, then reject it.
        loop {
            if approvals_repo.get(execution_id).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        approvals_repo
            .decide(execution_id, false, "reviewer@example.com", Some("not ready"))
            .await
            .unwrap();

        let outcome = running.await.unwrap().unwrap();
        assert!(matches!(outcome, Outcome::Failed { .. }));
    }
}
