//! Tunables shared across strategy implementations, with the defaults
//! named in spec §4.4.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Rolling: batch size. Default 2.
    pub max_concurrent: usize,
    /// Rolling: wait between a batch succeeding and health-checking it.
    /// Default 30s.
    pub health_check_delay: Duration,
    /// Blue-Green: bounded health sweep before switching traffic.
    /// Default 5 minutes.
    pub smoke_test_timeout: Duration,
    /// Canary: observation window between phases. Default 5 minutes.
    pub phase_observation_window: Duration,
    /// Canary: cumulative percentage of nodes at each phase.
    pub canary_phases: Vec<u8>,
    /// Blue-Green: deadline to wait for post-deploy metrics to settle
    /// within tolerance of the captured baseline.
    pub stabilization_deadline: Duration,
    /// Blue-Green: fractional tolerance (e.g. 0.1 = 10%) for comparing a
    /// sample against the baseline.
    pub stabilization_tolerance: f64,
    /// Blue-Green: consecutive in-tolerance samples required to call the
    /// cluster stable.
    pub stabilization_consecutive_samples: u32,
    pub stabilization_sample_interval: Duration,
    /// Blue-Green legacy mode (no metrics provider): fixed delay used in
    /// place of polled stabilization.
    pub legacy_stabilization_delay: Duration,
    /// Canary: error rate above which the trip predicate fires. Default
    /// 0.05 (5%).
    pub canary_error_rate_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            health_check_delay: Duration::from_secs(30),
            smoke_test_timeout: Duration::from_secs(5 * 60),
            phase_observation_window: Duration::from_secs(5 * 60),
            canary_phases: vec![10, 30, 50, 100],
            stabilization_deadline: Duration::from_secs(5 * 60),
            stabilization_tolerance: 0.1,
            stabilization_consecutive_samples: 3,
            stabilization_sample_interval: Duration::from_secs(10),
            legacy_stabilization_delay: Duration::from_secs(30),
            canary_error_rate_threshold: 0.05,
        }
    }
}
