//! Cluster membership and health (spec §6).

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rollout_core::{Environment, ExecutionContext};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_clusters))
        .route("/{env}", get(get_cluster))
        .route("/{env}/metrics", get(get_cluster_metrics))
}

#[derive(Debug, Serialize)]
pub struct ClusterSummary {
    pub environment: String,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
}

async fn list_clusters(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClusterSummary>>, ApiError> {
    let summaries = state
        .clusters
        .environments()
        .into_iter()
        .filter_map(|env| state.clusters.get(env).ok())
        .map(|cluster| ClusterSummary {
            environment: cluster.environment.to_string(),
            total_nodes: cluster.total_nodes(),
            healthy_nodes: cluster.healthy_nodes(),
        })
        .collect();
    Ok(Json(summaries))
}

#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub node_id: String,
    pub hostname: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ClusterDetailResponse {
    pub environment: String,
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub unhealthy_nodes: usize,
    pub metrics: Option<MetricsSnapshotResponse>,
    pub nodes: Vec<NodeSummary>,
}

async fn get_cluster(
    State(state): State<AppState>,
    Path(env): Path<String>,
) -> Result<Json<ClusterDetailResponse>, ApiError> {
    let env = parse_env(&env)?;
    let cluster = state.clusters.get(env)?;
    let ctx = ExecutionContext::new();
    let metrics = state
        .metrics
        .snapshot(&cluster, &ctx)
        .await
        .ok()
        .map(MetricsSnapshotResponse::from);

    Ok(Json(ClusterDetailResponse {
        environment: cluster.environment.to_string(),
        total_nodes: cluster.total_nodes(),
        healthy_nodes: cluster.healthy_nodes(),
        unhealthy_nodes: cluster.total_nodes() - cluster.healthy_nodes(),
        metrics,
        nodes: cluster
            .nodes()
            .iter()
            .map(|n| NodeSummary {
                node_id: n.id.to_string(),
                hostname: n.hostname.clone(),
                status: format!("{:?}", n.status),
            })
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshotResponse {
    pub error_rate: f64,
    pub p99_latency_ms: f64,
}

impl From<rollout_strategy::MetricsSnapshot> for MetricsSnapshotResponse {
    fn from(snapshot: rollout_strategy::MetricsSnapshot) -> Self {
        Self {
            error_rate: snapshot.error_rate,
            p99_latency_ms: snapshot.p99_latency_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetricsDataPoint {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub error_rate: f64,
    pub p99_latency_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct ClusterMetricsResponse {
    pub environment: String,
    pub interval: String,
    pub data_points: Vec<MetricsDataPoint>,
}

/// The core only exposes a point-in-time [`rollout_strategy::MetricsProvider`]
/// snapshot (what the stabilization gate and canary predicate consult) —
/// there is no historical metrics store behind it, so a query range collapses
/// to the single most recent sample.
async fn get_cluster_metrics(
    State(state): State<AppState>,
    Path(env): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<ClusterMetricsResponse>, ApiError> {
    let env = parse_env(&env)?;
    let cluster = state.clusters.get(env)?;
    let ctx = ExecutionContext::new();
    let snapshot = state
        .metrics
        .snapshot(&cluster, &ctx)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ClusterMetricsResponse {
        environment: cluster.environment.to_string(),
        interval: query.interval.unwrap_or_else(|| "point-in-time".to_string()),
        data_points: vec![MetricsDataPoint {
            timestamp: query.to.unwrap_or_else(chrono::Utc::now),
            error_rate: snapshot.error_rate,
            p99_latency_ms: snapshot.p99_latency_ms,
        }],
    }))
}

fn parse_env(raw: &str) -> Result<Environment, ApiError> {
    Environment::from_str(raw).map_err(ApiError::from)
}
