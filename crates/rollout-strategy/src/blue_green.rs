//! Blue-Green: deploy to the standby side, wait for it to prove itself, then
//! switch (spec §4.4.3).

use crate::common::{deploy_nodes_parallel, metadata_value};
use crate::metrics::{MetricsProvider, MetricsSnapshot};
use crate::result::DeploymentResult;
use crate::{StrategyConfig, StrategyExecutor};
use async_trait::async_trait;
use rollout_core::node::{Node, NodeAgent};
use rollout_core::{DeploymentRequest, EnvironmentCluster, ExecutionContext, StrategyKind};
use std::sync::Arc;
use std::time::Duration;

pub struct BlueGreenStrategy {
    config: StrategyConfig,
    metrics: Option<Arc<dyn MetricsProvider>>,
}

impl BlueGreenStrategy {
    pub fn new(config: StrategyConfig, metrics: Option<Arc<dyn MetricsProvider>>) -> Self {
        Self { config, metrics }
    }

    async fn wait_for_stabilization(
        &self,
        metrics: &dyn MetricsProvider,
        cluster: &EnvironmentCluster,
        baseline: &MetricsSnapshot,
        ctx: &ExecutionContext,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.stabilization_deadline;
        let mut consecutive = 0;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            match metrics.snapshot(cluster, ctx).await {
                Ok(snapshot) if snapshot.within_tolerance(baseline, self.config.stabilization_tolerance) => {
                    consecutive += 1;
                    if consecutive >= self.config.stabilization_consecutive_samples {
                        return true;
                    }
                }
                _ => consecutive = 0,
            }
            if ctx.sleep_or_cancel(self.config.stabilization_sample_interval).await {
                return false;
            }
        }
    }

    async fn run_smoke_tests(&self, nodes: &[Node], agent: &dyn NodeAgent, ctx: &ExecutionContext) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.smoke_test_timeout;
        loop {
            let healths = futures::future::join_all(nodes.iter().map(|n| agent.get_health(n, ctx))).await;
            if healths.iter().all(|h| matches!(h, Ok(health) if health.is_healthy)) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            if ctx.sleep_or_cancel(Duration::from_secs(5)).await {
                return false;
            }
        }
    }
}

#[async_trait]
impl StrategyExecutor for BlueGreenStrategy {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        cluster: &EnvironmentCluster,
        agent: &dyn NodeAgent,
        ctx: &ExecutionContext,
    ) -> DeploymentResult {
        let nodes = cluster.sorted_nodes();
        let metadata = metadata_value(request);

        let baseline = if let Some(metrics) = &self.metrics {
            match metrics.snapshot(cluster, ctx).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    return DeploymentResult::builder(StrategyKind::BlueGreen, request.environment)
                        .exception("failed to capture baseline metrics", e.to_string())
                }
            }
        } else {
            None
        };

        let node_results = deploy_nodes_parallel(&nodes, &request.module, &metadata, agent, ctx).await;
        let builder = DeploymentResult::builder(StrategyKind::BlueGreen, request.environment)
            .node_results(node_results.clone());

        if node_results.iter().any(|r| !r.success) {
            // Green was standby; nothing was ever promoted, so there is
            // nothing to roll back.
            return builder.failure("one or more standby nodes failed to deploy; traffic was not switched");
        }

        match (&self.metrics, baseline) {
            (Some(metrics), Some(baseline)) => {
                if !self
                    .wait_for_stabilization(metrics.as_ref(), cluster, &baseline, ctx)
                    .await
                {
                    return builder.failure("standby cluster metrics did not stabilize within deadline");
                }
            }
            _ => {
                if ctx.sleep_or_cancel(self.config.legacy_stabilization_delay).await {
                    return builder.exception("execution cancelled", "cancelled during legacy stabilization delay");
                }
            }
        }

        if !self.run_smoke_tests(&nodes, agent, ctx).await {
            return builder.failure("smoke tests failed on standby cluster");
        }

        tracing::info!(
            environment = %request.environment,
            module = %request.module,
            "switching traffic to green cluster"
        );
        builder.success(format!("promoted standby cluster running {}", request.module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_cluster::InMemoryNodeAgent;
    use rollout_core::{Environment, ModuleRef};
    use std::collections::HashMap;

    fn test_request() -> DeploymentRequest {
        DeploymentRequest {
            execution_id: rollout_core::ExecutionId::new(),
            module: ModuleRef::new("checkout", "1.0.0"),
            environment: Environment::Staging,
            strategy: StrategyKind::BlueGreen,
            require_approval: false,
            requester_email: "dev@example.com".to_string(),
            description: None,
            metadata: HashMap::new(),
        }
    }

    fn test_cluster() -> EnvironmentCluster {
        EnvironmentCluster::new(
            Environment::Staging,
            vec![Node::new("node-a", 8080, Environment::Staging)],
        )
    }

    fn fast_config() -> StrategyConfig {
        StrategyConfig {
            legacy_stabilization_delay: Duration::from_millis(1),
            stabilization_deadline: Duration::from_millis(50),
            stabilization_sample_interval: Duration::from_millis(1),
            stabilization_consecutive_samples: 1,
            smoke_test_timeout: Duration::from_millis(50),
            ..StrategyConfig::default()
        }
    }

    #[tokio::test]
    async fn legacy_mode_promotes_standby_without_a_metrics_provider() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster();
        let ctx = ExecutionContext::new();
        let request = test_request();
        let strategy = BlueGreenStrategy::new(fast_config(), None);

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(result.success);
        assert!(!result.rollback_performed);
    }

    #[tokio::test]
    async fn failed_standby_deploy_is_not_rolled_back() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster();
        agent.fail_node(cluster.sorted_nodes()[0].id);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let strategy = BlueGreenStrategy::new(fast_config(), None);

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(!result.success);
        assert!(!result.rollback_performed);
    }

    #[tokio::test]
    async fn metrics_provider_gates_promotion_on_stabilization() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster();
        let ctx = ExecutionContext::new();
        let request = test_request();
        let metrics: Arc<dyn MetricsProvider> = Arc::new(crate::metrics::StaticMetricsProvider::default());
        let strategy = BlueGreenStrategy::new(fast_config(), Some(metrics));

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(result.success);
    }
}
