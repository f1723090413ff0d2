//! The strategy contract's output type.

use chrono::{DateTime, Utc};
use rollout_core::node::{NodeDeploymentResult, NodeRollbackResult};
use rollout_core::{Environment, StrategyKind};
use serde::Serialize;

/// What every strategy's `deploy` call returns, win or lose. A strategy
/// never leaves the cluster partially on the new version while reporting
/// `success = false` — either `rollback_performed` is true and
/// `rollback_results` accounts for every node that had succeeded, or the
/// strategy never touched a node in the first place (Blue-Green before
/// traffic switch).
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResult {
    pub strategy: StrategyKind,
    pub environment: Environment,
    pub success: bool,
    pub message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub node_results: Vec<NodeDeploymentResult>,
    pub rollback_performed: bool,
    pub rollback_results: Vec<NodeRollbackResult>,
    pub rollback_successful: bool,
    pub exception: Option<String>,
}

impl DeploymentResult {
    pub fn builder(strategy: StrategyKind, environment: Environment) -> DeploymentResultBuilder {
        DeploymentResultBuilder {
            strategy,
            environment,
            start_time: Utc::now(),
            node_results: Vec::new(),
            rollback_performed: false,
            rollback_results: Vec::new(),
        }
    }
}

pub struct DeploymentResultBuilder {
    strategy: StrategyKind,
    environment: Environment,
    start_time: DateTime<Utc>,
    node_results: Vec<NodeDeploymentResult>,
    rollback_performed: bool,
    rollback_results: Vec<NodeRollbackResult>,
}

impl DeploymentResultBuilder {
    pub fn node_results(mut self, node_results: Vec<NodeDeploymentResult>) -> Self {
        self.node_results = node_results;
        self
    }

    pub fn rollback(mut self, rollback_results: Vec<NodeRollbackResult>) -> Self {
        self.rollback_performed = true;
        self.rollback_results = rollback_results;
        self
    }

    pub fn success(self, message: impl Into<String>) -> DeploymentResult {
        self.finish(true, message.into(), None)
    }

    pub fn failure(self, message: impl Into<String>) -> DeploymentResult {
        self.finish(false, message.into(), None)
    }

    pub fn exception(self, message: impl Into<String>, exception: impl Into<String>) -> DeploymentResult {
        self.finish(false, message.into(), Some(exception.into()))
    }

    fn finish(self, success: bool, message: String, exception: Option<String>) -> DeploymentResult {
        let rollback_successful = !self.rollback_performed
            || self.rollback_results.iter().all(|r| r.success);
        DeploymentResult {
            strategy: self.strategy,
            environment: self.environment,
            success,
            message,
            start_time: self.start_time,
            end_time: Utc::now(),
            node_results: self.node_results,
            rollback_performed: self.rollback_performed,
            rollback_results: self.rollback_results,
            rollback_successful,
            exception,
        }
    }
}
