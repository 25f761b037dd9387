use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orch_shared::checkpoint::CheckpointState;

use crate::error::EngineError;

use super::post_json;

#[derive(Debug, Clone, Serialize)]
pub struct SaveCheckpointRequest {
    pub id: String,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    pub step: u32,
    pub state: CheckpointState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointWireRecord {
    pub id: String,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    pub step: u32,
    pub state: CheckpointState,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveCheckpointResult {
    pub success: bool,
    pub id: String,
}

/// Speaks to the State tool service's checkpoint HTTP surface. This is the
/// transport layer beneath `checkpoint::CheckpointStore`; callers outside
/// the checkpoint module should prefer that higher-level API.
pub struct StateAdapter {
    base_url: String,
}

impl StateAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub async fn get_latest_checkpoint(
        &self,
        plan_id: &str,
    ) -> Result<Option<CheckpointWireRecord>, EngineError> {
        let req = serde_json::json!({ "planId": plan_id });
        match post_json(&self.base_url, "/api/state/checkpoints/latest", &req).await {
            Ok(record) => Ok(Some(record)),
            Err(EngineError::Adapter(msg)) if msg.contains("empty response data") => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub async fn save_checkpoint(
        &self,
        req: &SaveCheckpointRequest,
    ) -> Result<SaveCheckpointResult, EngineError> {
        post_json(&self.base_url, "/api/state/checkpoints", req).await
    }

    pub async fn delete_checkpoints(&self, plan_id: &str) -> Result<bool, EngineError> {
        let req = serde_json::json!({ "planId": plan_id });
        let result: serde_json::Value =
            post_json(&self.base_url, "/api/state/checkpoints/delete", &req).await?;
        Ok(result.get("deleted").and_then(|v| v.as_bool()).unwrap_or(true))
    }
}
