//! HTTP control plane for the Rollout deployment orchestrator.
//!
//! Provides the REST API described in spec §6: submitting deployments,
//! reading their status, deciding approvals, and inspecting cluster health.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
