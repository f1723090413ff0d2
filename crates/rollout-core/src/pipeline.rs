//! The tracker's in-memory model of a single pipeline execution.
//!
//! This is intentionally richer than the HTTP status enum in the
//! specification's §6 — the mapping from this internal representation to
//! the fixed HTTP vocabulary lives in `PipelineStatus::to_http`, the single
//! place spec.md's open question about inconsistent status mapping is
//! resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Internal pipeline state-machine status (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Created,
    Validating,
    AwaitingApproval,
    Acquiring,
    Executing,
    Finalizing,
    Succeeded,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }

    /// The HTTP status string fixed by spec §6:
    /// `{Pending, Running, PendingApproval, Succeeded, Failed, Cancelled}`.
    pub fn to_http(self) -> &'static str {
        match self {
            PipelineStatus::Created | PipelineStatus::Validating => "Pending",
            PipelineStatus::AwaitingApproval => "PendingApproval",
            PipelineStatus::Acquiring | PipelineStatus::Executing | PipelineStatus::Finalizing => {
                "Running"
            }
            PipelineStatus::Succeeded => "Succeeded",
            PipelineStatus::Failed => "Failed",
            PipelineStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending | StageStatus::Running)
    }
}

/// A single named step in a pipeline's progress (`Validating`, the chosen
/// strategy, `Rollback`, ...). Stages are append-only; once terminal, only
/// later stages may mutate the execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    pub start_time: DateTime<Utc>,
    pub duration: Option<Duration>,
    pub nodes_deployed: Option<u32>,
    pub nodes_failed: Option<u32>,
    pub message: Option<String>,
}

impl StageRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Pending,
            start_time: Utc::now(),
            duration: None,
            nodes_deployed: None,
            nodes_failed: None,
            message: None,
        }
    }
}

/// The tracker's live view of one execution. Non-durable; rebuilt from the
/// job table / approval table on lookup miss (see spec §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecutionState {
    pub execution_id: crate::id::ExecutionId,
    pub status: PipelineStatus,
    pub current_stage: Option<String>,
    pub stages: Vec<StageRecord>,
    pub last_updated: DateTime<Utc>,
}

impl PipelineExecutionState {
    pub fn new(execution_id: crate::id::ExecutionId) -> Self {
        Self {
            execution_id,
            status: PipelineStatus::Created,
            current_stage: None,
            stages: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn set_status(&mut self, status: PipelineStatus) {
        self.status = status;
        self.last_updated = Utc::now();
    }

    /// Append a new stage and mark it current/running.
    pub fn start_stage(&mut self, name: impl Into<String>) {
        let name = name.into();
        let mut stage = StageRecord::new(name.clone());
        stage.status = StageStatus::Running;
        self.current_stage = Some(name);
        self.stages.push(stage);
        self.last_updated = Utc::now();
    }

    /// Transition the most recently started stage to a terminal status.
    pub fn finish_current_stage(
        &mut self,
        status: StageStatus,
        nodes_deployed: Option<u32>,
        nodes_failed: Option<u32>,
        message: Option<String>,
    ) {
        if let Some(stage) = self.stages.last_mut() {
            stage.status = status;
            stage.duration = Some(
                (Utc::now() - stage.start_time)
                    .to_std()
                    .unwrap_or_default(),
            );
            stage.nodes_deployed = nodes_deployed;
            stage.nodes_failed = nodes_failed;
            stage.message = message;
        }
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ExecutionId;

    #[test]
    fn to_http_collapses_internal_phases_to_running() {
        assert_eq!(PipelineStatus::Acquiring.to_http(), "Running");
        assert_eq!(PipelineStatus::Executing.to_http(), "Running");
        assert_eq!(PipelineStatus::Finalizing.to_http(), "Running");
    }

    #[test]
    fn to_http_maps_terminal_statuses_to_themselves() {
        assert_eq!(PipelineStatus::Succeeded.to_http(), "Succeeded");
        assert_eq!(PipelineStatus::Failed.to_http(), "Failed");
        assert_eq!(PipelineStatus::Cancelled.to_http(), "Cancelled");
        assert!(PipelineStatus::Succeeded.is_terminal());
        assert!(!PipelineStatus::Executing.is_terminal());
    }

    #[test]
    fn execution_state_tracks_current_stage_lifecycle() {
        let mut state = PipelineExecutionState::new(ExecutionId::new());
        assert_eq!(state.status, PipelineStatus::Created);

        state.start_stage("validating");
        assert_eq!(state.current_stage.as_deref(), Some("validating"));
        assert_eq!(state.stages.last().unwrap().status, StageStatus::Running);

        state.finish_current_stage(StageStatus::Succeeded, Some(3), Some(0), None);
        assert_eq!(state.stages.last().unwrap().status, StageStatus::Succeeded);
        assert!(state.stages.last().unwrap().duration.is_some());
    }
}
