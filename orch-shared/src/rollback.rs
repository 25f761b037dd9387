use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Provider-specific rollback state, modeled as a sum type so that
/// provider-only invariants (e.g. "helm requires a release name") are
/// structural rather than runtime-checked optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum RollbackState {
    Terraform(TerraformState),
    Kubernetes(KubernetesState),
    Helm(HelmState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformState {
    pub working_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(default)]
    pub deployed_resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesState {
    pub working_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub deployed_resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmState {
    pub working_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub release_name: String,
    #[serde(default)]
    pub previous_revision: i64,
}

/// The durable record the Rollback Manager persists after an apply --
/// one in-memory entry plus one `<execution_id>.json` file per execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub execution_id: String,
    pub executed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: RollbackState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RollbackAction {
    pub fn ok(action: impl Into<String>, resource: impl Into<Option<String>>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            success: true,
            message: None,
        }
    }

    pub fn failed(
        action: impl Into<String>,
        resource: impl Into<Option<String>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RollbackOptions {
    pub execution_id: String,
    pub dry_run: bool,
    pub targets: Option<Vec<String>>,
    pub timeout: Option<Duration>,
}

impl RollbackOptions {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            dry_run: false,
            targets: None,
            timeout: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub success: bool,
    pub status: RollbackStatus,
    pub execution_id: String,
    pub resources_affected: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
    pub actions: Vec<RollbackAction>,
}
