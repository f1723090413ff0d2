//! Deployment strategy implementations for the Rollout orchestrator.
//!
//! `StrategyExecutor` is the seam the orchestrator calls through; the four
//! spec-named strategies (Direct, Rolling, Blue-Green, Canary) each
//! implement it over an already-resolved `EnvironmentCluster` and
//! `NodeAgent`.

mod blue_green;
mod canary;
mod canary_analyzer;
mod common;
mod config;
mod direct;
mod metrics;
mod result;
mod rolling;

pub use blue_green::BlueGreenStrategy;
pub use canary::CanaryStrategy;
pub use canary_analyzer::{CanaryAnalyzer, ErrorRateCanaryAnalyzer};
pub use config::StrategyConfig;
pub use direct::DirectStrategy;
pub use metrics::{MetricsProvider, MetricsSnapshot, StaticMetricsProvider};
pub use result::DeploymentResult;
pub use rolling::RollingStrategy;

use async_trait::async_trait;
use rollout_core::node::NodeAgent;
use rollout_core::{DeploymentRequest, EnvironmentCluster, ExecutionContext};

/// Shared contract every strategy implements (spec §4.4): deploy a request
/// over a resolved cluster, returning a tagged-union result rather than
/// propagating node failures as exceptions.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    async fn deploy(
        &self,
        request: &DeploymentRequest,
        cluster: &EnvironmentCluster,
        agent: &dyn NodeAgent,
        ctx: &ExecutionContext,
    ) -> DeploymentResult;
}

/// Resolve the executor for a request's chosen strategy.
pub fn executor_for(
    kind: rollout_core::StrategyKind,
    config: StrategyConfig,
    metrics: Option<std::sync::Arc<dyn MetricsProvider>>,
    canary_analyzer: std::sync::Arc<dyn CanaryAnalyzer>,
) -> Box<dyn StrategyExecutor> {
    use rollout_core::StrategyKind as K;
    match kind {
        K::Direct => Box::new(DirectStrategy),
        K::Rolling => Box::new(RollingStrategy::new(config)),
        K::BlueGreen => Box::new(BlueGreenStrategy::new(config, metrics)),
        K::Canary => Box::new(CanaryStrategy::new(config, metrics, canary_analyzer)),
    }
}
