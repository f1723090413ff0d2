//! Repository traits and PostgreSQL implementations.

pub mod approval;
pub mod job;

pub use approval::{ApprovalRepo, PgApprovalRepo};
pub use job::{DeploymentJobRepo, PgDeploymentJobRepo};
