//! Pipeline state machine and job processing for the Rollout orchestrator.
//!
//! - `tracker`: the replica-local, in-memory view of in-flight pipelines.
//! - `approval`: the approval gate service built on `rollout-db`'s durable
//!   approval table.
//! - `orchestrator`: the `PipelineOrchestrator` state machine.
//! - `job_processor`: claims durable job rows and drives them through the
//!   orchestrator, with lease-orphan recovery and retry/backoff.

pub mod approval;
pub mod job_processor;
pub mod orchestrator;
pub mod tracker;

pub use approval::ApprovalService;
pub use job_processor::JobProcessor;
pub use orchestrator::{Outcome, PipelineOrchestrator};
pub use tracker::DeploymentTracker;
