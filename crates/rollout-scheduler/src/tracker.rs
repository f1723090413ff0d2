//! The replica-local, in-memory view of in-flight pipelines (spec §5:
//! "In-memory state (tracker) is replica-local"). Entries are evicted 24h
//! after reaching a terminal status.

use chrono::{Duration as ChronoDuration, Utc};
use rollout_core::{ExecutionId, PipelineExecutionState, PipelineStatus, StageStatus};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const RETENTION: ChronoDuration = ChronoDuration::hours(24);

#[derive(Clone, Default)]
pub struct DeploymentTracker {
    executions: Arc<RwLock<HashMap<ExecutionId, PipelineExecutionState>>>,
}

impl DeploymentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, execution_id: ExecutionId) {
        self.executions
            .write()
            .expect("tracker lock poisoned")
            .insert(execution_id, PipelineExecutionState::new(execution_id));
    }

    pub fn get(&self, execution_id: ExecutionId) -> Option<PipelineExecutionState> {
        self.executions
            .read()
            .expect("tracker lock poisoned")
            .get(&execution_id)
            .cloned()
    }

    pub fn set_status(&self, execution_id: ExecutionId, status: PipelineStatus) {
        if let Some(state) = self
            .executions
            .write()
            .expect("tracker lock poisoned")
            .get_mut(&execution_id)
        {
            state.set_status(status);
        }
    }

    pub fn start_stage(&self, execution_id: ExecutionId, name: impl Into<String>) {
        if let Some(state) = self
            .executions
            .write()
            .expect("tracker lock poisoned")
            .get_mut(&execution_id)
        {
            state.start_stage(name);
        }
    }

    pub fn finish_current_stage(
        &self,
        execution_id: ExecutionId,
        status: StageStatus,
        nodes_deployed: Option<u32>,
        nodes_failed: Option<u32>,
        message: Option<String>,
    ) {
        if let Some(state) = self
            .executions
            .write()
            .expect("tracker lock poisoned")
            .get_mut(&execution_id)
        {
            state.finish_current_stage(status, nodes_deployed, nodes_failed, message);
        }
    }

    /// Drop terminal entries older than the retention window. Intended to
    /// run on a periodic sweep alongside the approval-expiry sweep.
    pub fn evict_expired(&self) {
        let now = Utc::now();
        self.executions
            .write()
            .expect("tracker lock poisoned")
            .retain(|_, state| {
                !state.status.is_terminal() || now - state.last_updated < RETENTION
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips() {
        let tracker = DeploymentTracker::new();
        let id = ExecutionId::new();
        tracker.create(id);
        tracker.start_stage(id, "Validating");

        let state = tracker.get(id).unwrap();
        assert_eq!(state.current_stage.as_deref(), Some("Validating"));
        assert_eq!(state.stages.len(), 1);
    }

    #[test]
    fn missing_execution_returns_none() {
        let tracker = DeploymentTracker::new();
        assert!(tracker.get(ExecutionId::new()).is_none());
    }
}
