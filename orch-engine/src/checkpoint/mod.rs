//! Checkpoint Store Client (component B). Persists and retrieves named
//! checkpoints keyed by plan id and step ordinal. Every method here is
//! safe to call concurrently; every method can fail, and the Executor
//! treats every failure as non-fatal (logged at `warn!`, execution
//! continues as if the checkpoint were absent).

use orch_shared::checkpoint::{Checkpoint, CheckpointState};

use crate::adapters::state::{SaveCheckpointRequest, StateAdapter};
use crate::error::EngineError;

pub struct CheckpointStore {
    adapter: StateAdapter,
}

impl CheckpointStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            adapter: StateAdapter::new(base_url),
        }
    }

    pub async fn get_latest_checkpoint(&self, plan_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        let record = self.adapter.get_latest_checkpoint(plan_id).await?;
        Ok(record.map(|r| Checkpoint {
            id: r.id,
            operation_id: r.operation_id,
            step: r.step,
            state: r.state,
            created_at: r.created_at,
        }))
    }

    pub async fn save_checkpoint(
        &self,
        plan_id: &str,
        step_ordinal: u32,
        state: CheckpointState,
    ) -> Result<bool, EngineError> {
        let req = SaveCheckpointRequest {
            id: Checkpoint::id_for(plan_id, step_ordinal),
            operation_id: plan_id.to_string(),
            step: step_ordinal,
            state,
        };
        let result = self.adapter.save_checkpoint(&req).await?;
        Ok(result.success)
    }

    pub async fn delete_checkpoints(&self, plan_id: &str) -> Result<bool, EngineError> {
        self.adapter.delete_checkpoints(plan_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_shared::checkpoint::CheckpointState;
    use std::collections::HashSet;

    #[tokio::test]
    async fn save_checkpoint_failure_is_surfaced_as_result_not_panic() {
        // An unroutable base URL exercises the network-failure path; the
        // store must return an `Err`, never panic, so the executor can
        // degrade to a warning.
        let store = CheckpointStore::new("http://127.0.0.1:1");
        let state = CheckpointState {
            completed_step_ids: HashSet::new(),
            results: vec![],
            last_completed_step: 0,
        };
        let result = store.save_checkpoint("plan-1", 1, state).await;
        assert!(result.is_err());
    }
}
