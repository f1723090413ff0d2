//! CLI command implementations.

pub mod approvals;
pub mod clusters;
pub mod deployments;
