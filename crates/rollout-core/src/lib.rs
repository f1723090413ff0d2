//! Core domain types and traits for the Rollout deployment orchestrator.
//!
//! This crate contains:
//! - Resource identifiers (`id`)
//! - Domain enums: `Environment`, `StrategyKind`, `ModuleRef`
//! - The deployment request and its validation (`request`)
//! - The durable job row backing the pipeline outbox (`job`)
//! - The approval gate's durable state (`approval`)
//! - The tracker's in-memory pipeline execution state (`pipeline`)
//! - Cluster membership and the `NodeAgent` trait (`cluster`, `node`)
//! - Cancellation plumbing (`context`)
//! - Lifecycle events (`events`)
//! - The crate-wide error type (`error`)

pub mod approval;
pub mod cluster;
pub mod context;
pub mod environment;
pub mod error;
pub mod events;
pub mod id;
pub mod job;
pub mod module;
pub mod node;
pub mod pipeline;
pub mod request;
pub mod strategy;

pub use approval::{ApprovalRequest, ApprovalStatus};
pub use cluster::{ClusterRegistry, EnvironmentCluster};
pub use context::ExecutionContext;
pub use environment::Environment;
pub use error::{Error, Result};
pub use events::{Event, EventSink, TracingEventSink};
pub use id::{ApprovalId, ExecutionId, NodeId, RollbackId};
pub use job::{DeploymentJob, JobStatus};
pub use module::ModuleRef;
pub use node::{
    DeployRequest, Node, NodeAgent, NodeHealth, NodeDeploymentResult, NodeRollbackResult,
    NodeStatus,
};
pub use pipeline::{PipelineExecutionState, PipelineStatus, StageRecord, StageStatus};
pub use request::DeploymentRequest;
pub use strategy::StrategyKind;
