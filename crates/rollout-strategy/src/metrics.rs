//! Metrics injected into Blue-Green (stabilization gate) and Canary (trip
//! predicate). Both are optional in the sense that a strategy without a
//! provider falls back to degraded, time-based behavior (spec §4.4.3's
//! "legacy mode").

use async_trait::async_trait;
use rollout_core::{EnvironmentCluster, ExecutionContext, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub error_rate: f64,
    pub p99_latency_ms: f64,
}

impl MetricsSnapshot {
    /// Whether `self` is within `tolerance` (a fraction, e.g. 0.1 = 10%) of
    /// `baseline` on every tracked dimension.
    pub fn within_tolerance(&self, baseline: &MetricsSnapshot, tolerance: f64) -> bool {
        let error_rate_ok = (self.error_rate - baseline.error_rate).abs() <= tolerance;
        let latency_budget = (baseline.p99_latency_ms * tolerance).max(1.0);
        let latency_ok = (self.p99_latency_ms - baseline.p99_latency_ms).abs() <= latency_budget;
        error_rate_ok && latency_ok
    }
}

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn snapshot(
        &self,
        cluster: &EnvironmentCluster,
        ctx: &ExecutionContext,
    ) -> Result<MetricsSnapshot>;
}

/// Always reports a zero-error, flat-latency snapshot. Used when no real
/// provider is configured; strategies treat its presence as "metrics
/// available" so tests can exercise the stabilization/canary code paths
/// without a live metrics backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticMetricsProvider {
    pub error_rate: f64,
    pub p99_latency_ms: f64,
}

#[async_trait]
impl MetricsProvider for StaticMetricsProvider {
    async fn snapshot(
        &self,
        _cluster: &EnvironmentCluster,
        _ctx: &ExecutionContext,
    ) -> Result<MetricsSnapshot> {
        Ok(MetricsSnapshot {
            error_rate: self.error_rate,
            p99_latency_ms: self.p99_latency_ms,
        })
    }
}
