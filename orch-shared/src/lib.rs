pub mod checkpoint;
pub mod drift;
pub mod execution;
pub mod plan;
pub mod rollback;
pub mod safety;
pub mod step;

pub mod prelude {
    pub use crate::checkpoint::{Checkpoint, CheckpointState};
    pub use crate::drift::{
        DriftItem, DriftReport, DriftSummary, DriftType, RemediationImpact, RemediationPlan,
        ResourceDrift, Severity,
    };
    pub use crate::execution::{
        Artifact, ErrorCode, ExecutionError, ExecutionResult, ExecutionStatus, LogEntry, LogLevel,
    };
    pub use crate::plan::{Plan, PlanStatus, PlanValidationError, RiskLevel};
    pub use crate::rollback::{
        ExecutionState, HelmState, KubernetesState, RollbackAction, RollbackOptions,
        RollbackOutcome, RollbackState, RollbackStatus, TerraformState,
    };
    pub use crate::safety::{CheckPhase, SafetyCategory, SafetyCheckResult, SafetySeverity};
    pub use crate::step::{Step, StepStatus, StepType};
}
