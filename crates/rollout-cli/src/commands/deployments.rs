//! `rollout deploy`, `status`, `list`, `rollback`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::client::ApiClient;

#[derive(Serialize)]
struct CreateDeploymentRequest {
    module_name: String,
    version: String,
    target_environment: String,
    deployment_strategy: String,
    require_approval: bool,
    requester_email: String,
    description: Option<String>,
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct AcceptedResponse {
    execution_id: String,
    status: String,
    estimated_duration_secs: u64,
    trace_id: String,
}

#[allow(clippy::too_many_arguments)]
pub async fn deploy(
    client: &ApiClient,
    module_name: &str,
    version: &str,
    environment: &str,
    strategy: &str,
    require_approval: bool,
    requester_email: &str,
    description: Option<String>,
    metadata: Vec<(String, String)>,
) -> Result<()> {
    let request = CreateDeploymentRequest {
        module_name: module_name.to_string(),
        version: version.to_string(),
        target_environment: environment.to_string(),
        deployment_strategy: strategy.to_string(),
        require_approval,
        requester_email: requester_email.to_string(),
        description,
        metadata: metadata.into_iter().collect(),
    };

    let accepted: AcceptedResponse = client.post("/api/v1/deployments", &request).await?;
    println!("Accepted: {}", accepted.execution_id);
    println!("  status:            {}", accepted.status);
    println!("  estimated duration: {}s", accepted.estimated_duration_secs);
    println!("  trace id:          {}", accepted.trace_id);
    Ok(())
}

#[derive(Deserialize)]
struct StageResponse {
    name: String,
    status: String,
    nodes_deployed: Option<u32>,
    nodes_failed: Option<u32>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct DeploymentDetailResponse {
    module_name: String,
    version: String,
    status: String,
    stages: Vec<StageResponse>,
    duration_secs: Option<f64>,
}

pub async fn status(client: &ApiClient, execution_id: &str) -> Result<()> {
    let detail: DeploymentDetailResponse = client
        .get(&format!("/api/v1/deployments/{execution_id}"))
        .await?;

    println!("{}@{}", detail.module_name, detail.version);
    println!("status: {}", detail.status);
    if let Some(duration) = detail.duration_secs {
        println!("duration: {duration:.1}s");
    }
    for stage in &detail.stages {
        let mut line = format!("  [{}] {}", stage.status, stage.name);
        if let Some(deployed) = stage.nodes_deployed {
            line.push_str(&format!(" deployed={deployed}"));
        }
        if let Some(failed) = stage.nodes_failed {
            line.push_str(&format!(" failed={failed}"));
        }
        if let Some(message) = &stage.message {
            line.push_str(&format!(" ({message})"));
        }
        println!("{line}");
    }
    Ok(())
}

#[derive(Deserialize)]
struct DeploymentSummary {
    execution_id: String,
    module_name: String,
    version: String,
    environment: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn list(client: &ApiClient, limit: i64) -> Result<()> {
    let summaries: Vec<DeploymentSummary> = client
        .get(&format!("/api/v1/deployments?limit={limit}"))
        .await?;

    for summary in &summaries {
        println!(
            "{}  {:<10} {}@{:<12} {:<10} {}",
            summary.created_at.to_rfc3339(),
            summary.environment,
            summary.module_name,
            summary.version,
            summary.status,
            summary.execution_id,
        );
    }
    Ok(())
}

#[derive(Deserialize)]
struct RollbackResponse {
    rollback_id: String,
    status: String,
    nodes_affected: u32,
}

pub async fn rollback(client: &ApiClient, execution_id: &str) -> Result<()> {
    let response: RollbackResponse = client
        .post(
            &format!("/api/v1/deployments/{execution_id}/rollback"),
            &serde_json::json!({}),
        )
        .await?;
    println!(
        "rollback {} ({}) - {} node(s) affected",
        response.rollback_id, response.status, response.nodes_affected
    );
    Ok(())
}
