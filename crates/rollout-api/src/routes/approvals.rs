//! Approval gate decisions (spec §4.5, §6).

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use rollout_core::id::ExecutionId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deployments/{id}/approve", post(approve))
        .route("/deployments/{id}/reject", post(reject))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approver_email: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub execution_id: ExecutionId,
    pub status: String,
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let decided = state
        .approvals
        .approve(id, &req.approver_email, req.reason.as_deref())
        .await?;
    Ok(Json(DecisionResponse {
        execution_id: id,
        status: format!("{:?}", decided.status),
    }))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let decided = state
        .approvals
        .reject(id, &req.approver_email, req.reason.as_deref())
        .await?;
    Ok(Json(DecisionResponse {
        execution_id: id,
        status: format!("{:?}", decided.status),
    }))
}
