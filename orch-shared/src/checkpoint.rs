use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::execution::ExecutionResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub completed_step_ids: HashSet<String>,
    pub results: Vec<ExecutionResult>,
    pub last_completed_step: u32,
}

/// A durable snapshot taken after each successfully completed step.
/// `id` is always `ckpt_<plan_id>_<step_ordinal>`. Checkpoints for a given
/// plan form a monotonically growing chain: every later checkpoint's
/// `completed_step_ids` is a superset of every earlier one's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub operation_id: String,
    pub step: u32,
    pub state: CheckpointState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn id_for(plan_id: &str, step_ordinal: u32) -> String {
        format!("ckpt_{plan_id}_{step_ordinal}")
    }

    pub fn new(plan_id: &str, step_ordinal: u32, state: CheckpointState) -> Self {
        Self {
            id: Self::id_for(plan_id, step_ordinal),
            operation_id: plan_id.to_string(),
            step: step_ordinal,
            state,
            created_at: Utc::now(),
        }
    }
}
