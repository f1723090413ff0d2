//! Rolling: deploy in batches, health-gating between them (spec §4.4.2).

use crate::common::{deploy_nodes_parallel, metadata_value, rollback_nodes_parallel};
use crate::result::DeploymentResult;
use crate::{StrategyConfig, StrategyExecutor};
use async_trait::async_trait;
use rollout_core::node::{Node, NodeAgent};
use rollout_core::{DeploymentRequest, EnvironmentCluster, ExecutionContext, StrategyKind};

pub struct RollingStrategy {
    config: StrategyConfig,
}

impl RollingStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StrategyExecutor for RollingStrategy {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        cluster: &EnvironmentCluster,
        agent: &dyn NodeAgent,
        ctx: &ExecutionContext,
    ) -> DeploymentResult {
        let nodes = cluster.sorted_nodes();
        let metadata = metadata_value(request);
        let batch_size = self.config.max_concurrent.max(1);
        let batches: Vec<&[Node]> = nodes.chunks(batch_size).collect();

        let mut all_node_results = Vec::new();
        let mut deployed_so_far: Vec<Node> = Vec::new();

        for (idx, batch) in batches.iter().enumerate() {
            let results = deploy_nodes_parallel(batch, &request.module, &metadata, agent, ctx).await;
            all_node_results.extend(results.clone());

            if results.iter().any(|r| !r.success) {
                let rollback_results =
                    rollback_nodes_parallel(&deployed_so_far, &request.module, agent).await;
                return DeploymentResult::builder(StrategyKind::Rolling, request.environment)
                    .node_results(all_node_results)
                    .rollback(rollback_results)
                    .failure(format!("batch {} failed to deploy {}", idx + 1, request.module));
            }
            deployed_so_far.extend(batch.iter().cloned());

            let is_last_batch = idx == batches.len() - 1;
            if is_last_batch {
                continue;
            }

            if ctx.sleep_or_cancel(self.config.health_check_delay).await {
                let rollback_results =
                    rollback_nodes_parallel(&deployed_so_far, &request.module, agent).await;
                return DeploymentResult::builder(StrategyKind::Rolling, request.environment)
                    .node_results(all_node_results)
                    .rollback(rollback_results)
                    .exception("execution cancelled", "cancelled during health-check wait");
            }

            let healths = futures::future::join_all(batch.iter().map(|n| agent.get_health(n, ctx))).await;
            let batch_unhealthy = healths
                .iter()
                .any(|h| !matches!(h, Ok(health) if health.is_healthy));
            if batch_unhealthy {
                let rollback_results =
                    rollback_nodes_parallel(&deployed_so_far, &request.module, agent).await;
                return DeploymentResult::builder(StrategyKind::Rolling, request.environment)
                    .node_results(all_node_results)
                    .rollback(rollback_results)
                    .failure(format!("batch {} reported unhealthy after deploy", idx + 1));
            }
        }

        DeploymentResult::builder(StrategyKind::Rolling, request.environment)
            .node_results(all_node_results)
            .success(format!(
                "rolled out {} across {} batch(es)",
                request.module,
                batches.len()
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_cluster::InMemoryNodeAgent;
    use rollout_core::{Environment, ModuleRef};
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_request() -> DeploymentRequest {
        DeploymentRequest {
            execution_id: rollout_core::ExecutionId::new(),
            module: ModuleRef::new("checkout", "1.0.0"),
            environment: Environment::Staging,
            strategy: StrategyKind::Rolling,
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

    fn fast_config(batch_size: usize) -> StrategyConfig {
        StrategyConfig {
            max_concurrent: batch_size,
            health_check_delay: Duration::from_millis(1),
            ..StrategyConfig::default()
        }
    }

    #[tokio::test]
    async fn rolls_out_across_batches() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster(4);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let strategy = RollingStrategy::new(fast_config(2));

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(result.success);
        assert_eq!(result.node_results.len(), 4);
        for node in cluster.sorted_nodes() {
            assert!(agent.is_deployed(node.id, &request.module));
        }
    }

    #[tokio::test]
    async fn unhealthy_first_batch_stops_the_rollout_before_later_batches_deploy() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster(4);
        let nodes = cluster.sorted_nodes();
        agent.mark_unhealthy(nodes[0].id);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let strategy = RollingStrategy::new(fast_config(2));

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(!result.success);
        assert!(result.rollback_performed);
        assert!(!agent.is_deployed(nodes[0].id, &request.module));
        assert!(!agent.is_deployed(nodes[1].id, &request.module));
        assert!(!agent.is_deployed(nodes[2].id, &request.module));
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_earlier_batches() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster(4);
        let nodes = cluster.sorted_nodes();
        agent.fail_node(nodes[2].id);
        let ctx = ExecutionContext::new();
        let request = test_request();
        let strategy = RollingStrategy::new(fast_config(2));

        let result = strategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(!result.success);
        assert!(result.rollback_performed);
        assert!(!agent.is_deployed(nodes[0].id, &request.module));
        assert!(!agent.is_deployed(nodes[1].id, &request.module));
    }
}
