//! Direct: deploy to every node at once. No batching, no health gating —
//! intended for Development (spec §4.4.1).

use crate::common::{deploy_nodes_parallel, metadata_value, rollback_nodes_parallel};
use crate::result::DeploymentResult;
use crate::StrategyExecutor;
use async_trait::async_trait;
use rollout_core::node::{Node, NodeAgent};
use rollout_core::{DeploymentRequest, EnvironmentCluster, ExecutionContext, StrategyKind};

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectStrategy;

#[async_trait]
impl StrategyExecutor for DirectStrategy {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        cluster: &EnvironmentCluster,
        agent: &dyn NodeAgent,
        ctx: &ExecutionContext,
    ) -> DeploymentResult {
        let nodes = cluster.sorted_nodes();
        let metadata = metadata_value(request);
        let node_results =
            deploy_nodes_parallel(&nodes, &request.module, &metadata, agent, ctx).await;

        let builder = DeploymentResult::builder(StrategyKind::Direct, request.environment)
            .node_results(node_results.clone());

        if node_results.iter().all(|r| r.success) {
            return builder.success(format!(
                "deployed {} to {} node(s)",
                request.module,
                node_results.len()
            ));
        }

        let succeeded: Vec<Node> = nodes
            .into_iter()
            .filter(|n| {
                node_results
                    .iter()
                    .any(|r| r.node_id == n.id && r.success)
            })
            .collect();
        let rollback_results = rollback_nodes_parallel(&succeeded, &request.module, agent).await;

        let failed = node_results.iter().filter(|r| !r.success).count();
        builder
            .rollback(rollback_results)
            .failure(format!("{failed} node(s) failed to deploy {}", request.module))
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
            strategy: StrategyKind::Direct,
            require_approval: false,
            requester_email: "dev@example.com".to_string(),
            description: None,
            metadata: HashMap::new(),
        }
    }

    fn test_cluster() -> EnvironmentCluster {
        EnvironmentCluster::new(
            Environment::Staging,
            vec![
                Node::new("node-a", 8080, Environment::Staging),
                Node::new("node-b", 8080, Environment::Staging),
            ],
        )
    }

    #[tokio::test]
    async fn deploys_to_every_node_at_once() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster();
        let ctx = ExecutionContext::new();
        let request = test_request();

        let result = DirectStrategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(result.success);
        assert_eq!(result.node_results.len(), 2);
        assert!(!result.rollback_performed);
    }

    #[tokio::test]
    async fn failed_node_triggers_rollback_of_the_rest() {
        let agent = InMemoryNodeAgent::new();
        let cluster = test_cluster();
        let failing = cluster.sorted_nodes()[0].id;
        agent.fail_node(failing);
        let ctx = ExecutionContext::new();
        let request = test_request();

        let result = DirectStrategy.deploy(&request, &cluster, &agent, &ctx).await;

        assert!(!result.success);
        assert!(result.rollback_performed);
        assert!(!agent.is_deployed(cluster.sorted_nodes()[1].id, &request.module));
    }
}
