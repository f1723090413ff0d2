//! `rollout approve` / `rollout reject`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;

#[derive(Serialize)]
struct DecisionRequest {
    approver_email: String,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct DecisionResponse {
    execution_id: String,
    status: String,
}

pub async fn approve(
    client: &ApiClient,
    execution_id: &str,
    approver_email: &str,
    reason: Option<String>,
) -> Result<()> {
    let request = DecisionRequest {
        approver_email: approver_email.to_string(),
        reason,
    };
    let response: DecisionResponse = client
        .post(
            &format!("/api/v1/approvals/deployments/{execution_id}/approve"),
            &request,
        )
        .await?;
    println!("{} -> {}", response.execution_id, response.status);
    Ok(())
}

pub async fn reject(
    client: &ApiClient,
    execution_id: &str,
    approver_email: &str,
    reason: Option<String>,
) -> Result<()> {
    let request = DecisionRequest {
        approver_email: approver_email.to_string(),
        reason,
    };
    let response: DecisionResponse = client
        .post(
            &format!("/api/v1/approvals/deployments/{execution_id}/reject"),
            &request,
        )
        .await?;
    println!("{} -> {}", response.execution_id, response.status);
    Ok(())
}
