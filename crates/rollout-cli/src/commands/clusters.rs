//! `rollout clusters` / `rollout cluster`.

use anyhow::Result;
use serde::Deserialize;

use crate::client::ApiClient;

#[derive(Deserialize)]
struct ClusterSummary {
    environment: String,
    total_nodes: usize,
    healthy_nodes: usize,
}

pub async fn list(client: &ApiClient) -> Result<()> {
    let summaries: Vec<ClusterSummary> = client.get("/api/v1/clusters").await?;
    for summary in &summaries {
        println!(
            "{:<12} {}/{} healthy",
            summary.environment, summary.healthy_nodes, summary.total_nodes
        );
    }
    Ok(())
}

#[derive(Deserialize)]
struct NodeSummary {
    node_id: String,
    hostname: String,
    status: String,
}

#[derive(Deserialize)]
struct ClusterDetailResponse {
    environment: String,
    total_nodes: usize,
    healthy_nodes: usize,
    unhealthy_nodes: usize,
    nodes: Vec<NodeSummary>,
}

pub async fn show(client: &ApiClient, environment: &str) -> Result<()> {
    let detail: ClusterDetailResponse = client.get(&format!("/api/v1/clusters/{environment}")).await?;
    println!(
        "{}: {} total, {} healthy, {} unhealthy",
        detail.environment, detail.total_nodes, detail.healthy_nodes, detail.unhealthy_nodes
    );
    for node in &detail.nodes {
        println!("  {:<10} {:<30} {}", node.status, node.hostname, node.node_id);
    }
    Ok(())
}
