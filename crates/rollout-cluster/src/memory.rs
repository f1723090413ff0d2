//! In-process `NodeAgent` for tests and local development. Tracks deployed
//! modules per node so idempotency and rollback behavior can be asserted on
//! directly instead of against a mocked HTTP server.

use async_trait::async_trait;
use rollout_core::node::{
    DeployRequest, Node, NodeAgent, NodeDeploymentResult, NodeHealth, NodeRollbackResult,
    NodeStatus,
};
use rollout_core::{Error, ExecutionContext, ModuleRef, NodeId, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct State {
    deployed: HashMap<NodeId, HashSet<String>>,
    failing_nodes: HashSet<NodeId>,
    unhealthy_nodes: HashSet<NodeId>,
}

/// Deterministic, fast `NodeAgent` backed by an in-memory map. Calling
/// [`InMemoryNodeAgent::fail_node`]/`mark_unhealthy` lets tests exercise
/// rollback and health-gate paths without a real node.
pub struct InMemoryNodeAgent {
    state: Mutex<State>,
}

impl InMemoryNodeAgent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn fail_node(&self, node_id: NodeId) {
        self.state.lock().unwrap().failing_nodes.insert(node_id);
    }

    pub fn mark_unhealthy(&self, node_id: NodeId) {
        self.state.lock().unwrap().unhealthy_nodes.insert(node_id);
    }

    pub fn is_deployed(&self, node_id: NodeId, module: &ModuleRef) -> bool {
        self.state
            .lock()
            .unwrap()
            .deployed
            .get(&node_id)
            .is_some_and(|modules| modules.contains(&module.to_string()))
    }
}

impl Default for InMemoryNodeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeAgent for InMemoryNodeAgent {
    async fn deploy_module(
        &self,
        node: &Node,
        request: &DeployRequest,
        ctx: &ExecutionContext,
    ) -> Result<NodeDeploymentResult> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_nodes.contains(&node.id) {
            return Err(Error::NodeDeployFailed {
                node_id: node.id,
                message: "simulated deploy failure".into(),
            });
        }

        state
            .deployed
            .entry(node.id)
            .or_default()
            .insert(request.module.to_string());

        Ok(NodeDeploymentResult {
            node_id: node.id,
            success: true,
            message: format!("deployed {}", request.module),
            duration: Duration::from_millis(1),
        })
    }

    async fn rollback_module(&self, node: &Node, module: &ModuleRef) -> Result<NodeRollbackResult> {
        let mut state = self.state.lock().unwrap();
        if let Some(modules) = state.deployed.get_mut(&node.id) {
            modules.remove(&module.to_string());
        }
        Ok(NodeRollbackResult {
            node_id: node.id,
            success: true,
            message: format!("rolled back {module}"),
        })
    }

    async fn get_health(&self, node: &Node, _ctx: &ExecutionContext) -> Result<NodeHealth> {
        let state = self.state.lock().unwrap();
        let status = if state.unhealthy_nodes.contains(&node.id) {
            NodeStatus::Unhealthy
        } else {
            NodeStatus::Healthy
        };
        Ok(NodeHealth {
            node_id: node.id,
            is_healthy: status == NodeStatus::Healthy,
            status,
            last_heartbeat: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_core::Environment;

    #[tokio::test]
    async fn deploy_then_rollback_clears_module() {
        let agent = InMemoryNodeAgent::new();
        let node = Node::new("node-a", 8080, Environment::Staging);
        let ctx = ExecutionContext::new();
        let module = ModuleRef::new("checkout", "1.2.3");
        let request = DeployRequest {
            module: module.clone(),
            metadata: serde_json::json!({}),
        };

        agent.deploy_module(&node, &request, &ctx).await.unwrap();
        assert!(agent.is_deployed(node.id, &module));

        agent.rollback_module(&node, &module).await.unwrap();
        assert!(!agent.is_deployed(node.id, &module));
    }

    #[tokio::test]
    async fn failing_node_returns_error() {
        let agent = InMemoryNodeAgent::new();
        let node = Node::new("node-b", 8080, Environment::Staging);
        let ctx = ExecutionContext::new();
        agent.fail_node(node.id);

        let request = DeployRequest {
            module: ModuleRef::new("checkout", "1.2.3"),
            metadata: serde_json::json!({}),
        };
        let err = agent.deploy_module(&node, &request, &ctx).await.unwrap_err();
        assert!(matches!(err, Error::NodeDeployFailed { .. }));
    }
}
