//! Node abstraction and the operations a cluster member exposes.

use crate::context::ExecutionContext;
use crate::id::NodeId;
use crate::module::ModuleRef;
use crate::{Environment, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// A single worker node within an environment's cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub hostname: String,
    pub port: u16,
    pub environment: Environment,
    pub last_heartbeat: DateTime<Utc>,
    pub status: NodeStatus,
}

impl Node {
    pub fn new(hostname: impl Into<String>, port: u16, environment: Environment) -> Self {
        Self {
            id: NodeId::new(),
            hostname: hostname.into(),
            port,
            environment,
            last_heartbeat: Utc::now(),
            status: NodeStatus::Unknown,
        }
    }
}

/// Result of a single node's `DeployModule` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDeploymentResult {
    pub node_id: NodeId,
    pub success: bool,
    pub message: String,
    pub duration: Duration,
}

/// Result of a single node's `RollbackModule` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRollbackResult {
    pub node_id: NodeId,
    pub success: bool,
    pub message: String,
}

/// Result of a single node's `GetHealth` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node_id: NodeId,
    pub is_healthy: bool,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
}

/// Everything a strategy needs to ask a node to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub module: ModuleRef,
    pub metadata: serde_json::Value,
}

/// The per-node RPC contract strategies are built on. Every operation is
/// idempotent per `(NodeId, ModuleName, Version)` — a second `deploy_module`
/// call with the same tuple after success must return success without
/// re-applying the side effect. Implementations own enforcing that; callers
/// may retry freely.
#[async_trait]
pub trait NodeAgent: Send + Sync {
    async fn deploy_module(
        &self,
        node: &Node,
        request: &DeployRequest,
        ctx: &ExecutionContext,
    ) -> Result<NodeDeploymentResult>;

    async fn rollback_module(&self, node: &Node, module: &ModuleRef) -> Result<NodeRollbackResult>;

    async fn get_health(&self, node: &Node, ctx: &ExecutionContext) -> Result<NodeHealth>;
}
