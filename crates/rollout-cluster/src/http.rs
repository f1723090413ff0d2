//! Node agent that drives real fleet nodes over HTTP.
//!
//! Each node is expected to expose a small control surface:
//! `POST /v1/deploy`, `POST /v1/rollback`, `GET /v1/health`. The wire
//! payloads mirror `rollout_core::node`'s request/result types directly —
//! there's no separate DTO layer, matching how thin the teacher's executor
//! RPCs already were.

use async_trait::async_trait;
use rollout_core::node::{
    DeployRequest, Node, NodeAgent, NodeDeploymentResult, NodeHealth, NodeRollbackResult,
    NodeStatus,
};
use rollout_core::{Error, ExecutionContext, ModuleRef, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Serialize)]
struct RollbackBody<'a> {
    module: &'a ModuleRef,
}

#[derive(Deserialize)]
struct DeployResponse {
    success: bool,
    message: String,
}

#[derive(Deserialize)]
struct RollbackResponse {
    success: bool,
    message: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    healthy: bool,
}

pub struct HttpNodeAgent {
    client: reqwest::Client,
}

impl HttpNodeAgent {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self { client }
    }

    fn base_url(node: &Node) -> String {
        format!("http://{}:{}", node.hostname, node.port)
    }
}

impl Default for HttpNodeAgent {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl NodeAgent for HttpNodeAgent {
    async fn deploy_module(
        &self,
        node: &Node,
        request: &DeployRequest,
        ctx: &ExecutionContext,
    ) -> Result<NodeDeploymentResult> {
        let url = format!("{}/v1/deploy", Self::base_url(node));
        let started = Instant::now();

        let send = self.client.post(&url).json(request).send();
        let response = match ctx.race(send).await {
            None => return Err(Error::Cancelled),
            Some(result) => result
                .map_err(|e| Error::NodeDeployFailed {
                    node_id: node.id,
                    message: e.to_string(),
                })?,
        };

        let body: DeployResponse = response.json().await.map_err(|e| Error::NodeDeployFailed {
            node_id: node.id,
            message: format!("decoding deploy response: {e}"),
        })?;

        if !body.success {
            return Err(Error::NodeDeployFailed {
                node_id: node.id,
                message: body.message,
            });
        }

        Ok(NodeDeploymentResult {
            node_id: node.id,
            success: true,
            message: body.message,
            duration: started.elapsed(),
        })
    }

    async fn rollback_module(&self, node: &Node, module: &ModuleRef) -> Result<NodeRollbackResult> {
        let url = format!("{}/v1/rollback", Self::base_url(node));
        let response = self
            .client
            .post(&url)
            .json(&RollbackBody { module })
            .send()
            .await
            .map_err(|e| Error::NodeDeployFailed {
                node_id: node.id,
                message: e.to_string(),
            })?;

        let body: RollbackResponse =
            response.json().await.map_err(|e| Error::NodeDeployFailed {
                node_id: node.id,
                message: format!("decoding rollback response: {e}"),
            })?;

        Ok(NodeRollbackResult {
            node_id: node.id,
            success: body.success,
            message: body.message,
        })
    }

    async fn get_health(&self, node: &Node, ctx: &ExecutionContext) -> Result<NodeHealth> {
        let url = format!("{}/v1/health", Self::base_url(node));
        let send = self.client.get(&url).send();

        let status = match ctx.race(send).await {
            None => return Err(Error::Cancelled),
            Some(Ok(response)) => match response.json::<HealthResponse>().await {
                Ok(body) if body.healthy => NodeStatus::Healthy,
                Ok(_) => NodeStatus::Unhealthy,
                Err(_) => NodeStatus::Unknown,
            },
            Some(Err(e)) => {
                tracing::warn!(node_id = %node.id, error = %e, "health check request failed");
                NodeStatus::Unknown
            }
        };

        Ok(NodeHealth {
            node_id: node.id,
            is_healthy: status == NodeStatus::Healthy,
            status,
            last_heartbeat: chrono::Utc::now(),
        })
    }
}
