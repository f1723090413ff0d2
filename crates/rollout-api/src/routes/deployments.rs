//! Deployment submission, status, listing, and rollback (spec §6).

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rollout_core::id::ExecutionId;
use rollout_core::{DeploymentRequest, Environment, ModuleRef, StrategyKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_deployments).post(create_deployment))
        .route("/{id}", get(get_deployment))
        .route("/{id}/rollback", post(rollback_deployment))
}

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub module_name: String,
    pub version: String,
    pub target_environment: String,
    pub deployment_strategy: String,
    #[serde(default)]
    pub require_approval: bool,
    pub requester_email: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub execution_id: ExecutionId,
    pub status: &'static str,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub estimated_duration_secs: u64,
    pub trace_id: String,
    pub links: HashMap<String, String>,
}

async fn create_deployment(
    State(state): State<AppState>,
    Json(req): Json<CreateDeploymentRequest>,
) -> Result<(axum::http::StatusCode, Json<AcceptedResponse>), ApiError> {
    let environment = Environment::from_str(&req.target_environment).map_err(ApiError::from)?;
    let strategy = StrategyKind::from_str(&req.deployment_strategy).map_err(ApiError::from)?;

    let execution_id = ExecutionId::new();
    let request = DeploymentRequest {
        execution_id,
        module: ModuleRef::new(req.module_name, req.version),
        environment,
        strategy,
        require_approval: req.require_approval,
        requester_email: req.requester_email,
        description: req.description,
        metadata: req.metadata,
    };
    request.validate().map_err(ApiError::from)?;

    let job = state
        .jobs
        .enqueue(&request, state.config.max_retries)
        .await?;

    let mut links = HashMap::new();
    links.insert(
        "self".to_string(),
        format!("/api/v1/deployments/{execution_id}"),
    );

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            execution_id,
            status: "Accepted",
            start_time: job.created_at,
            estimated_duration_secs: estimated_duration(strategy).as_secs(),
            trace_id: execution_id.to_string(),
            links,
        }),
    ))
}

fn estimated_duration(strategy: StrategyKind) -> std::time::Duration {
    use std::time::Duration;
    match strategy {
        StrategyKind::Direct => Duration::from_secs(60),
        StrategyKind::Rolling => Duration::from_secs(5 * 60),
        StrategyKind::BlueGreen => Duration::from_secs(10 * 60),
        StrategyKind::Canary => Duration::from_secs(20 * 60),
    }
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub name: String,
    pub status: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub duration_secs: Option<f64>,
    pub nodes_deployed: Option<u32>,
    pub nodes_failed: Option<u32>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeploymentDetailResponse {
    pub module_name: String,
    pub version: String,
    pub status: String,
    pub stages: Vec<StageResponse>,
    pub duration_secs: Option<f64>,
}

async fn get_deployment(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Result<Json<DeploymentDetailResponse>, ApiError> {
    if let Some(tracked) = state.orchestrator.tracker().get(id) {
        let stages = tracked
            .stages
            .iter()
            .map(|s| StageResponse {
                name: s.name.clone(),
                status: format!("{:?}", s.status),
                start_time: s.start_time,
                duration_secs: s.duration.map(|d| d.as_secs_f64()),
                nodes_deployed: s.nodes_deployed,
                nodes_failed: s.nodes_failed,
                message: s.message.clone(),
            })
            .collect::<Vec<_>>();
        let duration_secs = tracked
            .stages
            .iter()
            .filter_map(|s| s.duration)
            .map(|d| d.as_secs_f64())
            .sum::<f64>();

        let job = state.jobs.get(id).await?;
        return Ok(Json(DeploymentDetailResponse {
            module_name: job.payload.module.name.clone(),
            version: job.payload.module.version.clone(),
            status: tracked.status.to_http().to_string(),
            stages,
            duration_secs: if stages_present(&tracked) {
                Some(duration_secs)
            } else {
                None
            },
        }));
    }

    let job = state.jobs.get(id).await?;
    let status = match job.status {
        rollout_core::JobStatus::Pending => "Pending",
        rollout_core::JobStatus::Running => "Running",
        rollout_core::JobStatus::Succeeded => "Succeeded",
        rollout_core::JobStatus::Failed => "Failed",
        rollout_core::JobStatus::Cancelled => "Cancelled",
    };
    let duration_secs = match (job.started_at, job.completed_at) {
        (Some(start), Some(end)) => Some((end - start).to_std().unwrap_or_default().as_secs_f64()),
        _ => None,
    };

    Ok(Json(DeploymentDetailResponse {
        module_name: job.payload.module.name,
        version: job.payload.module.version,
        status: status.to_string(),
        stages: Vec::new(),
        duration_secs,
    }))
}

fn stages_present(state: &rollout_core::PipelineExecutionState) -> bool {
    !state.stages.is_empty()
}

#[derive(Debug, Serialize)]
pub struct DeploymentSummary {
    pub execution_id: ExecutionId,
    pub module_name: String,
    pub version: String,
    pub environment: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListDeploymentsQuery {
    pub limit: Option<i64>,
}

async fn list_deployments(
    State(state): State<AppState>,
    Query(query): Query<ListDeploymentsQuery>,
) -> Result<Json<Vec<DeploymentSummary>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let jobs = state.jobs.list_recent(limit).await?;

    let response = jobs
        .into_iter()
        .map(|job| {
            let status = state
                .orchestrator
                .tracker()
                .get(job.execution_id)
                .map(|t| t.status.to_http().to_string())
                .unwrap_or_else(|| job.status.to_string());
            DeploymentSummary {
                execution_id: job.execution_id,
                module_name: job.payload.module.name.clone(),
                version: job.payload.module.version.clone(),
                environment: job.payload.environment.to_string(),
                status,
                created_at: job.created_at,
            }
        })
        .collect();

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct RollbackResponse {
    pub rollback_id: rollout_core::id::RollbackId,
    pub status: String,
    pub nodes_affected: u32,
}

/// Only valid on a terminal `Succeeded` execution, or a `Failed` one where
/// the strategy's own rollback did not cover every deployed node (spec §6).
async fn rollback_deployment(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Result<Json<RollbackResponse>, ApiError> {
    let job = state.jobs.get(id).await?;
    if !matches!(
        job.status,
        rollout_core::JobStatus::Succeeded | rollout_core::JobStatus::Failed
    ) {
        return Err(ApiError::Conflict(
            "rollback is only valid for a succeeded or failed deployment".to_string(),
        ));
    }

    let cluster = state.clusters.get(job.payload.environment)?;
    let rollback_id = rollout_core::id::RollbackId::new();
    let mut nodes_affected = 0u32;
    for node in cluster.nodes() {
        if state
            .node_agent
            .rollback_module(node, &job.payload.module)
            .await
            .map(|r| r.success)
            .unwrap_or(false)
        {
            nodes_affected += 1;
        }
    }

    Ok(Json(RollbackResponse {
        rollback_id,
        status: "Completed".to_string(),
        nodes_affected,
    }))
}
