//! Parses the orchestrator's KDL configuration document into
//! [`OrchestratorConfig`] and the strategy tunables it wraps.
//!
//! Expected shape:
//!
//! ```kdl
//! orchestrator {
//!     lock-acquire-timeout-secs 30
//!     default-approval-timeout-secs 86400
//!     job-lease-duration-secs 300
//!     job-poll-interval-secs 5
//!     max-concurrent-jobs 10
//!     max-retries 5
//!     default-approver-emails "release-manager@example.com" "sre-oncall@example.com"
//! }
//!
//! strategy {
//!     max-concurrent 2
//!     health-check-delay-secs 30
//!     smoke-test-timeout-secs 300
//!     phase-observation-window-secs 300
//!     canary-phases 10 30 50 100
//!     stabilization-deadline-secs 300
//!     stabilization-tolerance 0.1
//!     stabilization-consecutive-samples 3
//!     stabilization-sample-interval-secs 10
//!     legacy-stabilization-delay-secs 30
//!     canary-error-rate-threshold 0.05
//! }
//! ```
//!
//! Every field is optional; omitted fields fall back to
//! [`StrategyConfig::default`]'s values (for the `strategy` block) or the
//! defaults named alongside each field below (for `orchestrator`).

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode, KdlValue};
use rollout_strategy::StrategyConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub lock_acquire_timeout: Duration,
    pub default_approval_timeout: Duration,
    pub job_lease_duration: Duration,
    pub job_poll_interval: Duration,
    pub max_concurrent_jobs: usize,
    pub max_retries: i32,
    pub default_approver_emails: Vec<String>,
    pub strategy: StrategyConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lock_acquire_timeout: Duration::from_secs(30),
            default_approval_timeout: Duration::from_secs(24 * 60 * 60),
            job_lease_duration: Duration::from_secs(5 * 60),
            job_poll_interval: Duration::from_secs(5),
            max_concurrent_jobs: 10,
            max_retries: 5,
            default_approver_emails: Vec::new(),
            strategy: StrategyConfig::default(),
        }
    }
}

/// Parse the full orchestrator configuration document.
pub fn parse_orchestrator_config(kdl: &str) -> ConfigResult<OrchestratorConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = OrchestratorConfig::default();

    if let Some(node) = find_node(&doc, "orchestrator") {
        let children = node.children().cloned().unwrap_or_default();
        if let Some(v) = secs(&children, "lock-acquire-timeout-secs")? {
            config.lock_acquire_timeout = v;
        }
        if let Some(v) = secs(&children, "default-approval-timeout-secs")? {
            config.default_approval_timeout = v;
        }
        if let Some(v) = secs(&children, "job-lease-duration-secs")? {
            config.job_lease_duration = v;
        }
        if let Some(v) = secs(&children, "job-poll-interval-secs")? {
            config.job_poll_interval = v;
        }
        if let Some(v) = int(&children, "max-concurrent-jobs")? {
            config.max_concurrent_jobs = v as usize;
        }
        if let Some(v) = int(&children, "max-retries")? {
            config.max_retries = v as i32;
        }
        if let Some(node) = find_node(&children, "default-approver-emails") {
            config.default_approver_emails = node
                .entries()
                .iter()
                .filter_map(|e| e.value().as_string())
                .map(str::to_string)
                .collect();
        }
    }

    if let Some(node) = find_node(&doc, "strategy") {
        let children = node.children().cloned().unwrap_or_default();
        let mut s = StrategyConfig::default();
        if let Some(v) = int(&children, "max-concurrent")? {
            s.max_concurrent = v as usize;
        }
        if let Some(v) = secs(&children, "health-check-delay-secs")? {
            s.health_check_delay = v;
        }
        if let Some(v) = secs(&children, "smoke-test-timeout-secs")? {
            s.smoke_test_timeout = v;
        }
        if let Some(v) = secs(&children, "phase-observation-window-secs")? {
            s.phase_observation_window = v;
        }
        if let Some(node) = find_node(&children, "canary-phases") {
            let phases: Vec<u8> = node
                .entries()
                .iter()
                .filter_map(|e| e.value().as_integer())
                .map(|n| n as u8)
                .collect();
            if !phases.is_empty() {
                s.canary_phases = phases;
            }
        }
        if let Some(v) = secs(&children, "stabilization-deadline-secs")? {
            s.stabilization_deadline = v;
        }
        if let Some(v) = float(&children, "stabilization-tolerance")? {
            s.stabilization_tolerance = v;
        }
        if let Some(v) = int(&children, "stabilization-consecutive-samples")? {
            s.stabilization_consecutive_samples = v as u32;
        }
        if let Some(v) = secs(&children, "stabilization-sample-interval-secs")? {
            s.stabilization_sample_interval = v;
        }
        if let Some(v) = secs(&children, "legacy-stabilization-delay-secs")? {
            s.legacy_stabilization_delay = v;
        }
        if let Some(v) = float(&children, "canary-error-rate-threshold")? {
            s.canary_error_rate_threshold = v;
        }
        config.strategy = s;
    }

    Ok(config)
}

fn find_node<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlNode> {
    doc.nodes().iter().find(|n| n.name().value() == name)
}

fn value_of<'a>(doc: &'a KdlDocument, name: &str) -> ConfigResult<Option<&'a KdlValue>> {
    let Some(node) = find_node(doc, name) else {
        return Ok(None);
    };
    let entry = node.entries().first().ok_or_else(|| ConfigError::InvalidValue {
        field: name.to_string(),
        message: "expected a single argument".to_string(),
    })?;
    Ok(Some(entry.value()))
}

fn secs(doc: &KdlDocument, name: &str) -> ConfigResult<Option<Duration>> {
    match value_of(doc, name)? {
        None => Ok(None),
        Some(v) => {
            let seconds = v.as_integer().ok_or_else(|| ConfigError::InvalidValue {
                field: name.to_string(),
                message: "expected an integer number of seconds".to_string(),
            })?;
            Ok(Some(Duration::from_secs(seconds.max(0) as u64)))
        }
    }
}

fn int(doc: &KdlDocument, name: &str) -> ConfigResult<Option<i64>> {
    match value_of(doc, name)? {
        None => Ok(None),
        Some(v) => v.as_integer().map(Some).ok_or_else(|| ConfigError::InvalidValue {
            field: name.to_string(),
            message: "expected an integer".to_string(),
        }),
    }
}

fn float(doc: &KdlDocument, name: &str) -> ConfigResult<Option<f64>> {
    match value_of(doc, name)? {
        None => Ok(None),
        Some(v) => v
            .as_float()
            .or_else(|| v.as_integer().map(|n| n as f64))
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: name.to_string(),
                message: "expected a number".to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_document_is_empty() {
        let config = parse_orchestrator_config("").unwrap();
        assert_eq!(config.max_concurrent_jobs, 10);
        assert_eq!(config.strategy.max_concurrent, 2);
    }

    #[test]
    fn overrides_named_fields() {
        let kdl = r#"
            orchestrator {
                max-concurrent-jobs 25
                max-retries 3
                default-approver-emails "a@example.com" "b@example.com"
            }
            strategy {
                max-concurrent 4
                canary-error-rate-threshold 0.1
                canary-phases 25 50 100
            }
        "#;
        let config = parse_orchestrator_config(kdl).unwrap();
        assert_eq!(config.max_concurrent_jobs, 25);
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.default_approver_emails,
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
        assert_eq!(config.strategy.max_concurrent, 4);
        assert_eq!(config.strategy.canary_error_rate_threshold, 0.1);
        assert_eq!(config.strategy.canary_phases, vec![25, 50, 100]);
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let kdl = r#"
            orchestrator {
                max-concurrent-jobs "not-a-number"
            }
        "#;
        assert!(parse_orchestrator_config(kdl).is_err());
    }
}
