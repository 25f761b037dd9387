use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            context: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// The taxonomy of error codes surfaced in `ExecutionResult.error.code`.
/// Never propagated as a Rust panic or an escaping `Err` out of the
/// executor's public entry points -- every step failure becomes one of
/// these, carried inside a terminal `ExecutionResult`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NonRetryableError,
    StepExecutionError,
    RetryExhausted,
    ExecutionError,
    RollbackError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ExecutionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stack: None,
        }
    }
}

/// One terminal outcome of a single step attempt.
/// Invariant: `completed_at >= started_at`; `status == Success` implies
/// `error.is_none()`; `status == Failure` implies `error.is_some()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub result_id: String,
    pub plan_id: String,
    pub step_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogEntry>>,
}

impl ExecutionResult {
    pub fn success(
        plan_id: impl Into<String>,
        step_id: impl Into<String>,
        started_at: DateTime<Utc>,
        outputs: BTreeMap<String, serde_json::Value>,
        artifacts: Vec<Artifact>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            result_id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            step_id: step_id.into(),
            status: ExecutionStatus::Success,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0),
            started_at,
            completed_at,
            outputs,
            artifacts,
            error: None,
            logs: None,
        }
    }

    pub fn failure(
        plan_id: impl Into<String>,
        step_id: impl Into<String>,
        started_at: DateTime<Utc>,
        error: ExecutionError,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            result_id: uuid::Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            step_id: step_id.into(),
            status: ExecutionStatus::Failure,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0),
            started_at,
            completed_at,
            outputs: BTreeMap::new(),
            artifacts: Vec::new(),
            error: Some(error),
            logs: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, ExecutionStatus::Failure)
    }
}
