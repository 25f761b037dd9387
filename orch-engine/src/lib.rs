//! Control-plane library for the infrastructure-as-code orchestration
//! engine: the Plan Executor, Safety Policy Engine, Rollback Manager, and
//! Drift Detector/Analyzer, plus the HTTP tool-adapter clients and
//! checkpoint store client they share.
//!
//! This crate has no binary entry point of its own -- callers embed it and
//! own whatever CLI, server, or scheduler drives `Executor::execute_plan`.

pub mod adapters;
pub mod checkpoint;
pub mod config;
pub mod drift;
pub mod error;
pub mod executor;
pub mod rollback;
pub mod safety;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::drift::DriftDetector;
    pub use crate::error::EngineError;
    pub use crate::executor::Executor;
    pub use crate::rollback::RollbackManager;
    pub use crate::safety::{SafetyContext, SafetyEngine, SafetyPolicy};

    pub use orch_shared::prelude::*;
}
