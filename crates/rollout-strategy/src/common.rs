//! Helpers shared by every strategy: parallel fan-out deploy/rollback over a
//! node slice, each node's own failure captured rather than propagated.

use rollout_core::node::{DeployRequest, Node, NodeAgent, NodeDeploymentResult, NodeRollbackResult};
use rollout_core::{DeploymentRequest, ExecutionContext};
use std::time::Duration;

pub(crate) fn metadata_value(request: &DeploymentRequest) -> serde_json::Value {
    serde_json::to_value(&request.metadata).unwrap_or_else(|_| serde_json::json!({}))
}

pub(crate) async fn deploy_nodes_parallel(
    nodes: &[Node],
    module: &rollout_core::ModuleRef,
    metadata: &serde_json::Value,
    agent: &dyn NodeAgent,
    ctx: &ExecutionContext,
) -> Vec<NodeDeploymentResult> {
    let futures = nodes.iter().map(|node| {
        let request = DeployRequest {
            module: module.clone(),
            metadata: metadata.clone(),
        };
        async move {
            match agent.deploy_module(node, &request, ctx).await {
                Ok(result) => result,
                Err(e) => NodeDeploymentResult {
                    node_id: node.id,
                    success: false,
                    message: e.to_string(),
                    duration: Duration::ZERO,
                },
            }
        }
    });
    futures::future::join_all(futures).await
}

pub(crate) async fn rollback_nodes_parallel(
    nodes: &[Node],
    module: &rollout_core::ModuleRef,
    agent: &dyn NodeAgent,
) -> Vec<NodeRollbackResult> {
    let futures = nodes.iter().map(|node| async move {
        match agent.rollback_module(node, module).await {
            Ok(result) => result,
            Err(e) => NodeRollbackResult {
                node_id: node.id,
                success: false,
                message: e.to_string(),
            },
        }
    });
    futures::future::join_all(futures).await
}
