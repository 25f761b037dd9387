//! Plan Executor (component A, the central control loop). Schedules a
//! plan's steps wave by wave in dependency order, retries each step with
//! exponential backoff, checkpoints progress after every completed step,
//! and never lets a step-level failure escape as a Rust panic or an
//! unexpected `Err` -- it always comes back as a terminal `ExecutionResult`
//! inside the returned `Vec`.

mod actions;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use orch_shared::checkpoint::CheckpointState;
use orch_shared::execution::{Artifact, ErrorCode, ExecutionError, ExecutionResult, LogEntry, LogLevel};
use orch_shared::plan::Plan;
use orch_shared::step::Step;

use crate::adapters::generator::GeneratorAdapter;
use crate::adapters::helm::HelmAdapter;
use crate::adapters::kubernetes::KubernetesAdapter;
use crate::adapters::terraform::TerraformAdapter;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::EngineError;
use crate::rollback::RollbackManager;
use crate::safety::SafetyEngine;

pub use actions::{ActionContext, StepOutcome};

const MAX_RETRIES: u32 = 3;

pub struct Executor {
    config: Config,
    checkpoint: CheckpointStore,
    safety: SafetyEngine,
    rollback: Arc<RollbackManager>,
    actions: ActionContext,
    logs: DashMap<String, Vec<LogEntry>>,
    artifacts: DashMap<String, Vec<Artifact>>,
}

impl Executor {
    pub fn new(config: Config) -> Arc<Self> {
        let rollback = Arc::new(RollbackManager::new(&config));
        let actions = ActionContext {
            terraform: TerraformAdapter::new(config.terraform_service_url.clone()),
            kubernetes: KubernetesAdapter::new(config.kubernetes_service_url.clone()),
            helm: HelmAdapter::new(config.helm_service_url.clone()),
            generator: GeneratorAdapter::new(config.generator_service_url.clone()),
            rollback: Arc::clone(&rollback),
        };

        Arc::new(Self {
            checkpoint: CheckpointStore::new(config.state_service_url.clone()),
            safety: SafetyEngine::new(),
            rollback,
            actions,
            logs: DashMap::new(),
            artifacts: DashMap::new(),
            config,
        })
    }

    pub fn safety_engine(&self) -> &SafetyEngine {
        &self.safety
    }

    pub fn rollback_manager(&self) -> &Arc<RollbackManager> {
        &self.rollback
    }

    #[tracing::instrument(skip_all, fields(plan_id = %plan.id))]
    pub async fn execute_plan(self: &Arc<Self>, plan: &mut Plan) -> Result<Vec<ExecutionResult>, EngineError> {
        plan.validate_dag()?;

        let pre_checks = self.safety.run_pre_execution_checks(plan, &self.config);
        if SafetyEngine::has_blocking_failure(&pre_checks) {
            let blockers: Vec<String> = pre_checks
                .iter()
                .filter(|c| !c.can_proceed)
                .map(|c| c.message.clone())
                .collect();
            return Err(EngineError::NonRetryable(format!(
                "blocked by safety policy: {}",
                blockers.join("; ")
            )));
        }

        self.run_from(plan, HashSet::new(), Vec::new()).await
    }

    /// Resumes a plan from its latest checkpoint. Per the data model's
    /// resume contract: if the checkpoint references a step id the current
    /// plan no longer has (renamed or removed since the checkpoint was
    /// written), that id -- and every id recorded after it -- is dropped
    /// rather than trusted, and the plan restarts from scratch. Silently
    /// trusting a stale id would let the scheduler believe a step ran when
    /// the plan in hand no longer has any record of it.
    #[tracing::instrument(skip_all, fields(plan_id = %plan.id))]
    pub async fn resume_plan(self: &Arc<Self>, plan: &mut Plan) -> Result<Vec<ExecutionResult>, EngineError> {
        let checkpoint = self
            .checkpoint
            .get_latest_checkpoint(&plan.id)
            .await?
            .ok_or_else(|| EngineError::NoCheckpoint(plan.id.clone()))?;

        let known_ids: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        let recorded = checkpoint.state.completed_step_ids;
        let all_known = recorded.iter().all(|id| known_ids.contains(id.as_str()));

        let (completed, results) = if all_known {
            (recorded, checkpoint.state.results)
        } else {
            tracing::warn!(
                plan_id = %plan.id,
                "checkpoint references step ids no longer present in this plan; restarting from scratch"
            );
            (HashSet::new(), Vec::new())
        };

        self.run_from(plan, completed, results).await
    }

    /// Executes a step's `rollback_action` once, outside the retry policy:
    /// a rollback is a deliberate, manually-triggered remediation, not
    /// something the scheduler should retry on its own.
    pub async fn rollback_step(&self, plan_id: &str, step: &Step) -> Result<ExecutionResult, EngineError> {
        let action = step
            .rollback_action
            .clone()
            .ok_or_else(|| EngineError::NoRollbackAction(step.id.clone()))?;

        let started_at = Utc::now();
        let rollback_step = Step::new(format!("{}-rollback", step.id), step.ordinal, step.step_type, action);

        match self.actions.dispatch(&rollback_step, plan_id).await {
            Ok(outcome) => Ok(ExecutionResult::success(
                plan_id,
                step.id.clone(),
                started_at,
                outcome.outputs,
                outcome.artifacts,
            )),
            Err(e) => Ok(ExecutionResult::failure(
                plan_id,
                step.id.clone(),
                started_at,
                e.into_execution_error(),
            )),
        }
    }

    pub fn get_logs(&self, plan_id: &str) -> Vec<LogEntry> {
        self.logs.get(plan_id).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn get_artifacts(&self, plan_id: &str) -> Vec<Artifact> {
        self.artifacts.get(plan_id).map(|v| v.clone()).unwrap_or_default()
    }

    fn log(&self, plan_id: &str, level: LogLevel, message: impl Into<String>) {
        self.logs
            .entry(plan_id.to_string())
            .or_default()
            .push(LogEntry::new(level, message));
    }

    async fn run_from(
        self: &Arc<Self>,
        plan: &mut Plan,
        mut executed: HashSet<String>,
        mut results: Vec<ExecutionResult>,
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        loop {
            let mut ready: Vec<Step> = plan
                .steps
                .iter()
                .filter(|s| !executed.contains(&s.id))
                .filter(|s| {
                    s.depends_on
                        .as_ref()
                        .map_or(true, |deps| deps.iter().all(|d| executed.contains(d)))
                })
                .cloned()
                .collect();

            if ready.is_empty() {
                if executed.len() == plan.steps.len() {
                    break;
                }
                tracing::error!(
                    plan_id = %plan.id,
                    unresolved = plan.steps.len() - executed.len(),
                    "dependency deadlock: no ready steps remain but the plan is incomplete"
                );
                break;
            }

            ready.sort_by_key(|s| s.ordinal);
            tracing::debug!(plan_id = %plan.id, wave_size = ready.len(), "dispatching wave");

            let handles: Vec<_> = ready
                .iter()
                .map(|step| {
                    let executor = Arc::clone(self);
                    let plan_id = plan.id.clone();
                    let step = step.clone();
                    tokio::spawn(async move { Self::execute_with_retry(executor, plan_id, step).await })
                })
                .collect();

            let joined = futures::future::join_all(handles).await;

            let mut wave_failed = false;
            for (step, joined_result) in ready.iter().zip(joined.into_iter()) {
                let result = match joined_result {
                    Ok(result) => result,
                    Err(join_err) => ExecutionResult::failure(
                        plan.id.clone(),
                        step.id.clone(),
                        Utc::now(),
                        ExecutionError::new(
                            ErrorCode::ExecutionError,
                            format!("step task panicked: {join_err}"),
                        ),
                    ),
                };

                if result.is_failure() {
                    self.log(
                        &plan.id,
                        LogLevel::Error,
                        format!("step {} failed: {:?}", step.id, result.error),
                    );
                    if let Some(step_mut) = plan.step_mut(&step.id) {
                        step_mut.status = orch_shared::step::StepStatus::Failed;
                    }
                    results.push(result);
                    wave_failed = true;
                    break;
                }

                self.log(&plan.id, LogLevel::Info, format!("step {} completed", step.id));
                self.artifacts
                    .entry(plan.id.clone())
                    .or_default()
                    .extend(result.artifacts.clone());

                if let Some(step_mut) = plan.step_mut(&step.id) {
                    step_mut.status = orch_shared::step::StepStatus::Completed;
                    step_mut.completed_at = Some(result.completed_at);
                    step_mut.duration_ms = Some(result.duration_ms);
                }

                executed.insert(step.id.clone());
                results.push(result);

                let checkpoint_state = CheckpointState {
                    completed_step_ids: executed.clone(),
                    results: results.clone(),
                    last_completed_step: step.ordinal,
                };
                if let Err(e) = self.checkpoint.save_checkpoint(&plan.id, step.ordinal, checkpoint_state).await {
                    tracing::warn!(plan_id = %plan.id, step_id = %step.id, error = %e, "checkpoint write failed; continuing without it");
                }

                let during_checks = self.safety.run_during_execution_checks(plan, step, &results, &self.config);
                for check in during_checks.iter().filter(|c| !c.passed) {
                    let level = if check.can_proceed { LogLevel::Warn } else { LogLevel::Error };
                    self.log(
                        &plan.id,
                        level,
                        format!("safety check {} ({:?}): {}", check.check_id, check.severity, check.message),
                    );
                }
                if SafetyEngine::has_blocking_failure(&during_checks) {
                    tracing::error!(
                        plan_id = %plan.id,
                        step_id = %step.id,
                        "during-execution safety check blocked continued execution"
                    );
                    wave_failed = true;
                    break;
                }
            }

            if wave_failed {
                self.run_post_execution_checks(plan, &results).await;
                return Ok(results);
            }
        }

        if let Err(e) = self.checkpoint.delete_checkpoints(&plan.id).await {
            tracing::warn!(plan_id = %plan.id, error = %e, "failed to clean up checkpoints after successful completion");
        }

        self.run_post_execution_checks(plan, &results).await;
        Ok(results)
    }

    /// Runs post-execution safety checks as observers: their outcome is
    /// logged but never changes a plan's already-settled results.
    async fn run_post_execution_checks(&self, plan: &Plan, results: &[ExecutionResult]) {
        let post_checks = self.safety.run_post_execution_checks(plan, results, &self.config);
        for check in post_checks.iter().filter(|c| !c.passed) {
            self.log(
                &plan.id,
                LogLevel::Warn,
                format!("safety check {} ({:?}): {}", check.check_id, check.severity, check.message),
            );
        }
    }

    /// Attempts a single step up to `MAX_RETRIES + 1` times with
    /// `1000 * 2^attempt` ms exponential backoff between attempts.
    /// `NON_RETRYABLE_ERROR` stops after one attempt. On exhaustion, a
    /// `StepExecutionError` (the action dispatch itself reporting a
    /// well-formed failure) is returned unchanged; any other retryable
    /// error is resynthesized as `RETRY_EXHAUSTED`.
    async fn execute_with_retry(executor: Arc<Self>, plan_id: String, step: Step) -> ExecutionResult {
        let started_at = Utc::now();
        let mut attempts = 0u32;
        let mut last_err: Option<EngineError> = None;

        for attempt in 0..=MAX_RETRIES {
            attempts = attempt + 1;
            match executor.actions.dispatch(&step, &plan_id).await {
                Ok(outcome) => {
                    return ExecutionResult::success(
                        plan_id,
                        step.id.clone(),
                        started_at,
                        outcome.outputs,
                        outcome.artifacts,
                    );
                }
                Err(e) => {
                    if !e.is_retryable() {
                        last_err = Some(e);
                        break;
                    }
                    if attempt == MAX_RETRIES {
                        last_err = Some(e);
                        break;
                    }
                    let backoff_ms = 1000u64 * 2u64.pow(attempt);
                    tracing::warn!(
                        plan_id = %plan_id,
                        step_id = %step.id,
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "step attempt failed, retrying after backoff"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }

        let err = last_err.expect("loop exits via `break` only after recording an error");
        let final_error = if !err.is_retryable() {
            err.into_execution_error()
        } else {
            match &err {
                EngineError::StepExecutionError(_) => err.into_execution_error(),
                _ => ExecutionError::new(
                    ErrorCode::RetryExhausted,
                    format!("retries exhausted after {attempts} attempts: {err}"),
                ),
            }
        };

        ExecutionResult::failure(plan_id, step.id.clone(), started_at, final_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_shared::step::{Step, StepType};

    fn config_with_unroutable_adapters() -> Config {
        let mut cfg = Config::default();
        // Unroutable on purpose -- these tests exercise retry/failure paths,
        // never a live tool service.
        let dead = "http://127.0.0.1:1".to_string();
        cfg.terraform_service_url = dead.clone();
        cfg.kubernetes_service_url = dead.clone();
        cfg.helm_service_url = dead.clone();
        cfg.generator_service_url = dead.clone();
        cfg.state_service_url = dead.clone();
        cfg.fs_service_url = dead;
        cfg.rollback_backup_dir = std::env::temp_dir().join(format!("orch-exec-test-{}", uuid::Uuid::new_v4()));
        cfg
    }

    #[tokio::test]
    async fn unknown_provider_fails_without_retrying() {
        let executor = Executor::new(config_with_unroutable_adapters());
        let mut plan = Plan::new(
            "p-unknown-provider",
            "deploy",
            vec![Step::new("s1", 1, StepType::Validate, "validate_requirements")
                .with_param("provider", serde_json::json!("invalid"))],
        );

        let started = std::time::Instant::now();
        let results = executor.execute_plan(&mut plan).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_failure());
        assert_eq!(
            results[0].error.as_ref().unwrap().code,
            ErrorCode::NonRetryableError
        );
        assert!(elapsed < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_action_exhausts_retries() {
        let executor = Executor::new(config_with_unroutable_adapters());
        let mut plan = Plan::new(
            "p-unknown-action",
            "deploy",
            vec![Step::new("s1", 1, StepType::Deploy, "not_a_real_action")],
        );

        let results = executor.execute_plan(&mut plan).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_failure());
        let code = results[0].error.as_ref().unwrap().code;
        assert!(matches!(code, ErrorCode::RetryExhausted | ErrorCode::StepExecutionError));
    }

    #[tokio::test]
    async fn independent_steps_in_the_same_wave_both_run() {
        let executor = Executor::new(config_with_unroutable_adapters());
        let mut plan = Plan::new(
            "p-parallel",
            "deploy",
            vec![
                Step::new("a", 1, StepType::Validate, "validate_requirements")
                    .with_param("provider", serde_json::json!("aws")),
                Step::new("b", 2, StepType::Validate, "validate_requirements")
                    .with_param("provider", serde_json::json!("gcp")),
            ],
        );

        let results = executor.execute_plan(&mut plan).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_failure()));
    }

    #[tokio::test(start_paused = true)]
    async fn a_step_failure_halts_dependents_but_keeps_prior_results() {
        let executor = Executor::new(config_with_unroutable_adapters());
        let mut plan = Plan::new(
            "p-halt",
            "deploy",
            vec![
                Step::new("a", 1, StepType::Validate, "validate_requirements")
                    .with_param("provider", serde_json::json!("aws")),
                Step::new("b", 2, StepType::Deploy, "not_a_real_action").with_depends_on(["a"]),
                Step::new("c", 3, StepType::Deploy, "apply_deployment").with_depends_on(["b"]),
            ],
        );

        let results = executor.execute_plan(&mut plan).await.unwrap();
        // `a` succeeds, `b` exhausts retries and fails, `c` never runs.
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_failure());
        assert!(results[1].is_failure());
    }

    #[tokio::test]
    async fn resume_without_a_reachable_checkpoint_store_is_an_error_not_a_panic() {
        // The checkpoint store is unroutable in this fixture, so the lookup
        // itself fails before the "no checkpoint" case can even be
        // distinguished -- either way, `resume_plan` must return `Err`.
        let executor = Executor::new(config_with_unroutable_adapters());
        let mut plan = Plan::new(
            "p-no-checkpoint",
            "deploy",
            vec![Step::new("a", 1, StepType::Validate, "validate_requirements")],
        );
        let result = executor.resume_plan(&mut plan).await;
        assert!(result.is_err());
    }
}
