//! Node-agent implementations for the Rollout deployment orchestrator.
//!
//! `rollout_core::node::NodeAgent` is the trait strategies are built
//! against; this crate only supplies concrete backends.

pub mod http;
pub mod memory;

pub use http::HttpNodeAgent;
pub use memory::InMemoryNodeAgent;
