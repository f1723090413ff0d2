//! Canary: phased rollout by percentage, tripped by an injectable error-rate
//! predicate between phases (spec §4.4.4).

use crate::canary_analyzer::CanaryAnalyzer;
use crate::common::{deploy_nodes_parallel, metadata_value, rollback_nodes_parallel};
use crate::metrics::MetricsProvider;
use crate::result::DeploymentResult;
use crate::{StrategyConfig, StrategyExecutor};
use async_trait::async_trait;
use rollout_core::node::{Node, NodeAgent};
use rollout_core::{DeploymentRequest, EnvironmentCluster, ExecutionContext, StrategyKind};
use std::sync::Arc;

pub struct CanaryStrategy {
    config: StrategyConfig,
    metrics: Option<Arc<dyn MetricsProvider>>,
    analyzer: Arc<dyn CanaryAnalyzer>,
}

impl CanaryStrategy {
    pub fn new(
        config: StrategyConfig,
        metrics: Option<Arc<dyn MetricsProvider>>,
        analyzer: Arc<dyn CanaryAnalyzer>,
    ) -> Self {
        Self {
            config,
            metrics,
            analyzer,
        }
    }

    async fn observed_error_rate(&self, cluster: &EnvironmentCluster, ctx: &ExecutionContext) -> f64 {
        match &self.metrics {
            Some(metrics) => metrics.snapshot(cluster, ctx).await.map(|s| s.error_rate).unwrap_or(0.0),
            None => 0.0,
        }
    }
}

#[async_trait]
impl StrategyExecutor for CanaryStrategy {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        cluster: &EnvironmentCluster,
        agent: &dyn NodeAgent,
        ctx: &ExecutionContext,
    ) -> DeploymentResult {
        let nodes = cluster.sorted_nodes();
        let metadata = metadata_value(request);
        let total = nodes.len();

        let mut deployed_so_far: Vec<Node> = Vec::new();
        let mut all_node_results = Vec::new();
        let phases = self.config.canary_phases.clone();

        for (idx, pct) in phases.iter().enumerate() {
            let target_count = (((*pct as f64) / 100.0) * total as f64).ceil() as usize;
            let target_count = target_count.min(total);
            if target_count <= deployed_so_far.len() {
                continue;
            }
            let batch: Vec<Node> = nodes[deployed_so_far.len()..target_count].to_vec();

            let results = deploy_nodes_parallel(&batch, &request.module, &metadata, agent, ctx).await;
            all_node_results.extend(results.clone());
            deployed_so_far.extend(batch.into_iter());

            if results.iter().any(|r| !r.success) {
                let rollback_results =
                    rollback_nodes_parallel(&deployed_so_far, &request.module, agent).await;
                return DeploymentResult::builder(StrategyKind::Canary, request.environment)
                    .node_results(all_node_results)
                    .rollback(rollback_results)
                    .failure(format!("canary phase {pct}% failed to deploy {}", request.module));
            }

            let is_last_phase = idx == phases.len() - 1;
            if is_last_phase {
                continue;
            }

            if ctx.sleep_or_cancel(self.config.phase_observation_window).await {
                let rollback_results =
                    rollback_nodes_parallel(&deployed_so_far, &request.module, agent).await;
                return DeploymentResult::builder(StrategyKind::Canary, request.environment)
                    .node_results(all_node_results)
                    .rollback(rollback_results)
                    .exception("execution cancelled", "cancelled during phase observation window");
            }

            let error_rate = self.observed_error_rate(cluster, ctx).await;
            if self.analyzer.predicate_fired(error_rate) {
                let rollback_results =
                    rollback_nodes_parallel(&deployed_so_far, &request.module, agent).await;
                return DeploymentResult::builder(StrategyKind::Canary, request.environment)
                    .node_results(all_node_results)
                    .rollback(rollback_results)
                    .failure(format!(
                        "canary tripped at phase {pct}%: observed error rate {:.2}%",
                        error_rate * 100.0
                    ));
            }
        }

        DeploymentResult::builder(StrategyKind::Canary, request.environment)
            .node_results(all_node_results)
            .success(format!("canary rollout of {} completed", request.module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canary_analyzer::ErrorRateCanaryAnalyzer;
    use crate::metrics::StaticMetricsProvider;
    use rollout_cluster::InMemoryNodeAgent;
    use rollout_core::{Environment, ModuleRef};
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_request() -> DeploymentRequest {
        DeploymentRequest {
            execution_id: rollout_core::ExecutionId::new(),
            module: ModuleRef::new("checkout", "1.0.0"),
            environment: Environment::Staging,
            strategy: StrategyKind::Canary,
            require_approval: false,
            requester_email: "dev@example.com".to_string(),
            description: None,
            metadata: HashMap::new(),
        }
    }

    fn test_cluster(node_count: usize) -> EnvironmentCluster {
        let nodes = (0..node_count)
            .map(|i| Node::new(format!("node-{i}"), 8080, Environment::Staging))
            .collect();
        EnvironmentCluster::new(Environment::Staging, nodes)
    }

    fn fast_config() -> StrategyConfig {
        StrategyConfig {
            canary_phases: vec![25, 50, 100],
            phase_observation_window: Duration::from_millis(1),
            ..StrategyConfig::default()
        }
    }

    #[tokio::test]
    async fn completes_all_phases_when_error_rate_stays_low() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster(4);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let metrics: Arc<dyn MetricsProvider> = Arc::new(StaticMetricsProvider {
            error_rate: 0.0,
            p99_latency_ms: 50.0,
        });
        let analyzer = Arc::new(ErrorRateCanaryAnalyzer::new(0.05));
        let strategy = CanaryStrategy::new(fast_config(), Some(metrics), analyzer);

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(result.success);
        for node in cluster.sorted_nodes() {
            assert!(agent.is_deployed(node.id, &request.module));
        }
    }

    #[tokio::test]
    async fn tripped_predicate_rolls_back_the_canary_phase() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster(4);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let metrics: Arc<dyn MetricsProvider> = Arc::new(StaticMetricsProvider {
            error_rate: 0.2,
            p99_latency_ms: 50.0,
        });
        let analyzer = Arc::new(ErrorRateCanaryAnalyzer::new(0.05));
        let strategy = CanaryStrategy::new(fast_config(), Some(metrics), analyzer);

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(!result.success);
        assert!(result.rollback_performed);
        for node in cluster.sorted_nodes() {
            assert!(!agent.is_deployed(node.id, &request.module));
        }
    }

    #[tokio::test]
    async fn failed_node_in_a_phase_rolls_back_that_phase() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster(4);
        agent.fail_node(cluster.sorted_nodes()[0].id);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let analyzer = Arc::new(ErrorRateCanaryAnalyzer::default());
        let strategy = CanaryStrategy::new(fast_config(), None, analyzer);

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(!result.success);
        assert!(result.rollback_performed);
    }
}
