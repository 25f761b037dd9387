use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    PreExecution,
    DuringExecution,
    PostExecution,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Security,
    Cost,
    Availability,
    Compliance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SafetySeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheckResult {
    pub check_id: String,
    pub passed: bool,
    pub severity: SafetySeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub can_proceed: bool,
    pub requires_approval: bool,
}

impl SafetyCheckResult {
    pub fn pass(check_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            passed: true,
            severity: SafetySeverity::Low,
            message: message.into(),
            details: None,
            can_proceed: true,
            requires_approval: false,
        }
    }

    pub fn block(
        check_id: impl Into<String>,
        severity: SafetySeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            passed: false,
            severity,
            message: message.into(),
            details: None,
            can_proceed: false,
            requires_approval: true,
        }
    }

    pub fn warn(
        check_id: impl Into<String>,
        severity: SafetySeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            passed: false,
            severity,
            message: message.into(),
            details: None,
            can_proceed: true,
            requires_approval: false,
        }
    }
}
