//! Composition root: wires every crate's concrete implementation together
//! behind `Arc`, built once in `main` and cloned into each request (spec
//! §5 — explicit values, never global statics).

use rollout_cluster::HttpNodeAgent;
use rollout_config::{ClusterSeed, OrchestratorConfig};
use rollout_coordination::PgAdvisoryLock;
use rollout_core::cluster::EnvironmentCluster;
use rollout_core::node::NodeAgent;
use rollout_core::{ClusterRegistry, EventSink, TracingEventSink};
use rollout_db::{
    create_pool, run_migrations, DeploymentJobRepo, PgApprovalRepo, PgDeploymentJobRepo,
    PgIdempotencyStore,
};
use rollout_scheduler::{ApprovalService, PipelineOrchestrator};
use rollout_strategy::{CanaryAnalyzer, ErrorRateCanaryAnalyzer, MetricsProvider, StaticMetricsProvider};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state handed to every axum route.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jobs: Arc<dyn DeploymentJobRepo>,
    pub approvals: Arc<ApprovalService>,
    pub clusters: ClusterRegistry,
    pub node_agent: Arc<dyn NodeAgent>,
    pub metrics: Arc<dyn MetricsProvider>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub config: OrchestratorConfig,
}

impl AppState {
    pub async fn new(
        database_url: &str,
        config: OrchestratorConfig,
        cluster_seeds: Vec<ClusterSeed>,
    ) -> anyhow::Result<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;

        let jobs: Arc<dyn DeploymentJobRepo> = Arc::new(PgDeploymentJobRepo::new(pool.clone()));
        let approvals_repo = Arc::new(PgApprovalRepo::new(pool.clone()));
        let idempotency = Arc::new(PgIdempotencyStore::new(pool.clone()));
        let lock = Arc::new(PgAdvisoryLock::new(pool.clone()));
        let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        let clusters = ClusterRegistry::new();
        for seed in cluster_seeds {
            clusters.register(EnvironmentCluster::new(seed.environment, seed.nodes));
        }
        let node_agent: Arc<dyn NodeAgent> = Arc::new(HttpNodeAgent::default());
        let metrics: Arc<dyn MetricsProvider> = Arc::new(StaticMetricsProvider::default());
        let canary_analyzer: Arc<dyn CanaryAnalyzer> =
            Arc::new(ErrorRateCanaryAnalyzer::new(config.strategy.canary_error_rate_threshold));

        let approvals = Arc::new(ApprovalService::new(approvals_repo, events.clone()));

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            clusters.clone(),
            lock,
            idempotency,
            jobs.clone(),
            approvals.clone(),
            rollout_scheduler::DeploymentTracker::new(),
            events,
            node_agent.clone(),
            Some(metrics.clone()),
            canary_analyzer,
            config.clone(),
        ));

        Ok(Self {
            pool,
            jobs,
            approvals,
            clusters,
            node_agent,
            metrics,
            orchestrator,
            config,
        })
    }
}
