use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Validate,
    Generate,
    Deploy,
    Verify,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One unit of work in a `Plan`. `ordinal` is unique within the plan and
/// establishes the tie-break order used by the executor within a wave;
/// `depends_on` refers to other step ids within the same plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub ordinal: u32,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub action: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_action: Option<String>,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl Step {
    pub fn new(id: impl Into<String>, ordinal: u32, step_type: StepType, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ordinal,
            step_type,
            action: action.into(),
            parameters: BTreeMap::new(),
            depends_on: None,
            rollback_action: None,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_depends_on(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rollback_action(mut self, action: impl Into<String>) -> Self {
        self.rollback_action = Some(action.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, StepStatus::Completed | StepStatus::Failed)
    }
}
