use orch_shared::execution::{ErrorCode, ExecutionError};

/// The engine's internal error type. Step-level failures never escape the
/// executor's public entry points as a Rust `Err` -- they are converted to
/// an `ExecutionError` and carried inside a terminal `ExecutionResult`
/// instead. `EngineError` is used for the narrower set of problems the
/// executor *does* surface as `Result::Err`: malformed plans, checkpoint
/// plumbing used directly by callers, and adapter construction failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("non-retryable error: {0}")]
    NonRetryable(String),

    #[error("step execution error: {0}")]
    StepExecutionError(String),

    #[error("retry exhausted: {0}")]
    RetryExhausted(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("rollback error: {0}")]
    RollbackError(String),

    #[error("adapter request failed: {0}")]
    Adapter(String),

    #[error("no checkpoint found for plan {0}")]
    NoCheckpoint(String),

    #[error("step has no rollback action: {0}")]
    NoRollbackAction(String),

    #[error(transparent)]
    PlanInvalid(#[from] orch_shared::plan::PlanValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NonRetryable(_) => ErrorCode::NonRetryableError,
            EngineError::StepExecutionError(_) => ErrorCode::StepExecutionError,
            EngineError::RetryExhausted(_) => ErrorCode::RetryExhausted,
            EngineError::RollbackError(_) => ErrorCode::RollbackError,
            _ => ErrorCode::ExecutionError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, EngineError::NonRetryable(_))
    }

    pub fn into_execution_error(self) -> ExecutionError {
        let code = self.code();
        ExecutionError::new(code, self.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Adapter(err.to_string())
    }
}
