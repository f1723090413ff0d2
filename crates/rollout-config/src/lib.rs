//! KDL configuration parsing for the Rollout deployment orchestrator.

pub mod clusters;
pub mod config;
pub mod error;

pub use clusters::{parse_clusters, ClusterSeed};
pub use config::{parse_orchestrator_config, OrchestratorConfig};
pub use error::{ConfigError, ConfigResult};
