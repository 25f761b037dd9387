//! Safety Policy Engine (component C). A read-mostly registry of pluggable
//! checks, each bound to one of three phases. Checks never panic: every
//! check function returns a `SafetyCheckResult`, and a check that cannot
//! evaluate its condition (missing data) defaults to the conservative
//! `pass` outcome rather than blocking on an indeterminate state.

use std::sync::Arc;

use dashmap::DashMap;
use orch_shared::execution::ExecutionResult;
use orch_shared::plan::Plan;
use orch_shared::safety::{CheckPhase, SafetyCategory, SafetyCheckResult, SafetySeverity};
use orch_shared::step::Step;

use crate::config::Config;

/// Everything a check function might need, across all three phases. Not
/// every field is populated for every phase -- `step` is `None` before
/// execution starts and after it ends; `results` is empty pre-execution.
pub struct SafetyContext<'a> {
    pub plan: &'a Plan,
    pub step: Option<&'a Step>,
    pub results: &'a [ExecutionResult],
    pub config: &'a Config,
}

type CheckFn = dyn Fn(&SafetyContext) -> SafetyCheckResult + Send + Sync;

#[derive(Clone)]
pub struct SafetyPolicy {
    pub id: String,
    pub phase: CheckPhase,
    pub category: SafetyCategory,
    check: Arc<CheckFn>,
}

impl SafetyPolicy {
    pub fn new(
        id: impl Into<String>,
        phase: CheckPhase,
        category: SafetyCategory,
        check: impl Fn(&SafetyContext) -> SafetyCheckResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            phase,
            category,
            check: Arc::new(check),
        }
    }

    fn evaluate(&self, ctx: &SafetyContext) -> SafetyCheckResult {
        (self.check)(ctx)
    }
}

pub struct SafetyEngine {
    policies: DashMap<String, SafetyPolicy>,
}

impl Default for SafetyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyEngine {
    pub fn new() -> Self {
        let engine = Self { policies: DashMap::new() };
        for policy in builtin_policies() {
            engine.register(policy);
        }
        engine
    }

    pub fn register(&self, policy: SafetyPolicy) {
        self.policies.insert(policy.id.clone(), policy);
    }

    fn run_phase(&self, phase: CheckPhase, ctx: &SafetyContext) -> Vec<SafetyCheckResult> {
        let mut results: Vec<SafetyCheckResult> = self
            .policies
            .iter()
            .filter(|p| p.phase == phase)
            .map(|p| p.evaluate(ctx))
            .collect();
        results.sort_by(|a, b| a.check_id.cmp(&b.check_id));
        results
    }

    #[tracing::instrument(skip_all, fields(plan_id = %plan.id))]
    pub fn run_pre_execution_checks(&self, plan: &Plan, config: &Config) -> Vec<SafetyCheckResult> {
        let ctx = SafetyContext { plan, step: None, results: &[], config };
        self.run_phase(CheckPhase::PreExecution, &ctx)
    }

    #[tracing::instrument(skip_all, fields(plan_id = %plan.id, step_id = %step.id))]
    pub fn run_during_execution_checks(
        &self,
        plan: &Plan,
        step: &Step,
        results: &[ExecutionResult],
        config: &Config,
    ) -> Vec<SafetyCheckResult> {
        let ctx = SafetyContext { plan, step: Some(step), results, config };
        self.run_phase(CheckPhase::DuringExecution, &ctx)
    }

    #[tracing::instrument(skip_all, fields(plan_id = %plan.id))]
    pub fn run_post_execution_checks(
        &self,
        plan: &Plan,
        results: &[ExecutionResult],
        config: &Config,
    ) -> Vec<SafetyCheckResult> {
        let ctx = SafetyContext { plan, step: None, results, config };
        self.run_phase(CheckPhase::PostExecution, &ctx)
    }

    /// A plan cannot proceed if any check result has `can_proceed == false`.
    pub fn has_blocking_failure(results: &[SafetyCheckResult]) -> bool {
        results.iter().any(|r| !r.can_proceed)
    }
}

const COST_LIMIT_USD: f64 = 5000.0;
const MAX_RESOURCE_CREATION_RATE: usize = 50;
const MAX_EXECUTION_TIMEOUT_SECS: u64 = 3600;
const COST_ANOMALY_VARIANCE: f64 = 0.20;
const MIN_SECURITY_POSTURE_SCORE: i64 = 80;

fn builtin_policies() -> Vec<SafetyPolicy> {
    vec![
        SafetyPolicy::new(
            "production_requires_approval",
            CheckPhase::PreExecution,
            SafetyCategory::Compliance,
            |ctx| {
                let is_prod = ctx.plan.goal.to_lowercase().contains("production")
                    || ctx.plan.risk_level >= orch_shared::plan::RiskLevel::High;
                if is_prod && !ctx.plan.requires_approval {
                    return SafetyCheckResult::block(
                        "production_requires_approval",
                        SafetySeverity::Critical,
                        "production-risk plans must carry an approver before execution",
                    );
                }
                SafetyCheckResult::pass("production_requires_approval", "approval requirement satisfied")
            },
        ),
        SafetyPolicy::new(
            "cost_limit",
            CheckPhase::PreExecution,
            SafetyCategory::Cost,
            |ctx| match ctx.plan.estimated_cost_usd {
                Some(cost) if cost > COST_LIMIT_USD => SafetyCheckResult::block(
                    "cost_limit",
                    SafetySeverity::High,
                    format!("estimated cost ${cost:.2} exceeds the ${COST_LIMIT_USD:.2} monthly limit"),
                ),
                _ => SafetyCheckResult::pass("cost_limit", "estimated cost within limit"),
            },
        ),
        SafetyPolicy::new(
            "security_best_practices_step_present",
            CheckPhase::PreExecution,
            SafetyCategory::Security,
            |ctx| {
                let has_step = ctx
                    .plan
                    .steps
                    .iter()
                    .any(|s| s.action == "apply_best_practices");
                if has_step {
                    SafetyCheckResult::pass(
                        "security_best_practices_step_present",
                        "plan includes a best-practices review step",
                    )
                } else {
                    SafetyCheckResult::warn(
                        "security_best_practices_step_present",
                        SafetySeverity::Medium,
                        "plan has no best-practices review step",
                    )
                }
            },
        ),
        SafetyPolicy::new(
            "backup_strategy_for_stateful_prod",
            CheckPhase::PreExecution,
            SafetyCategory::Availability,
            |ctx| {
                let touches_stateful_prod = ctx.plan.steps.iter().any(|s| {
                    s.param_str("stateful") == Some("true") && s.param_str("environment") == Some("production")
                });
                let has_backup_step = ctx.plan.steps.iter().any(|s| s.rollback_action.is_some());
                if touches_stateful_prod && !has_backup_step {
                    SafetyCheckResult::block(
                        "backup_strategy_for_stateful_prod",
                        SafetySeverity::Critical,
                        "stateful production components require a rollback-capable step",
                    )
                } else {
                    SafetyCheckResult::pass(
                        "backup_strategy_for_stateful_prod",
                        "stateful production components are rollback-covered",
                    )
                }
            },
        ),
        SafetyPolicy::new(
            "destructive_ops_require_rollback",
            CheckPhase::PreExecution,
            SafetyCategory::Availability,
            |ctx| {
                let offenders: Vec<&str> = ctx
                    .plan
                    .steps
                    .iter()
                    .filter(|s| s.action.contains("destroy") || s.action.contains("delete"))
                    .filter(|s| s.rollback_action.is_none())
                    .map(|s| s.id.as_str())
                    .collect();
                if offenders.is_empty() {
                    SafetyCheckResult::pass(
                        "destructive_ops_require_rollback",
                        "all destructive steps declare a rollback action",
                    )
                } else {
                    SafetyCheckResult::block(
                        "destructive_ops_require_rollback",
                        SafetySeverity::High,
                        format!("steps without a rollback action: {}", offenders.join(", ")),
                    )
                }
            },
        ),
        SafetyPolicy::new(
            "resource_creation_rate",
            CheckPhase::PreExecution,
            SafetyCategory::Availability,
            |ctx| {
                if ctx.plan.steps.len() > MAX_RESOURCE_CREATION_RATE {
                    SafetyCheckResult::warn(
                        "resource_creation_rate",
                        SafetySeverity::Medium,
                        format!(
                            "plan has {} steps, above the {MAX_RESOURCE_CREATION_RATE}-resource review threshold",
                            ctx.plan.steps.len()
                        ),
                    )
                } else {
                    SafetyCheckResult::pass("resource_creation_rate", "resource creation rate within bounds")
                }
            },
        ),
        SafetyPolicy::new(
            "execution_timeout",
            CheckPhase::PreExecution,
            SafetyCategory::Availability,
            |ctx| match ctx.plan.estimated_duration_secs {
                Some(secs) if secs > MAX_EXECUTION_TIMEOUT_SECS => SafetyCheckResult::block(
                    "execution_timeout",
                    SafetySeverity::Medium,
                    format!("estimated duration {secs}s exceeds the {MAX_EXECUTION_TIMEOUT_SECS}s ceiling"),
                ),
                _ => SafetyCheckResult::pass("execution_timeout", "estimated duration within bounds"),
            },
        ),
        SafetyPolicy::new(
            "token_budget",
            CheckPhase::DuringExecution,
            SafetyCategory::Cost,
            |ctx| {
                if ctx.config.max_tokens_per_task == 0 {
                    return SafetyCheckResult::pass("token_budget", "token budget check disabled");
                }
                let Some(step) = ctx.step else {
                    return SafetyCheckResult::pass("token_budget", "no step in context");
                };
                let used = ctx
                    .results
                    .iter()
                    .find(|r| r.step_id == step.id)
                    .and_then(|r| r.outputs.get("tokens_used"))
                    .and_then(|v| v.as_u64());
                match used {
                    Some(used) if used > ctx.config.max_tokens_per_task => SafetyCheckResult::block(
                        "token_budget",
                        SafetySeverity::High,
                        format!(
                            "step used {used} tokens, exceeding the {}-token budget",
                            ctx.config.max_tokens_per_task
                        ),
                    ),
                    _ => SafetyCheckResult::pass("token_budget", "token usage within budget"),
                }
            },
        ),
        SafetyPolicy::new(
            "require_dry_run_before_apply",
            CheckPhase::DuringExecution,
            SafetyCategory::Compliance,
            |ctx| {
                let Some(step) = ctx.step else {
                    return SafetyCheckResult::pass("require_dry_run_before_apply", "no step in context");
                };
                if step.action != "apply_deployment" {
                    return SafetyCheckResult::pass("require_dry_run_before_apply", "not an apply step");
                }
                let planned = ctx
                    .results
                    .iter()
                    .any(|r| r.step_id != step.id && r.outputs.contains_key("plan_output"));
                if planned {
                    SafetyCheckResult::pass("require_dry_run_before_apply", "a prior plan step ran for this apply")
                } else {
                    SafetyCheckResult::warn(
                        "require_dry_run_before_apply",
                        SafetySeverity::Medium,
                        "apply step has no preceding plan step in this execution",
                    )
                }
            },
        ),
        SafetyPolicy::new(
            "deployment_verify_present",
            CheckPhase::PostExecution,
            SafetyCategory::Availability,
            |ctx| {
                let applied = ctx.plan.steps.iter().any(|s| s.action == "apply_deployment");
                let verified = ctx.plan.steps.iter().any(|s| s.action == "verify_deployment");
                if applied && !verified {
                    SafetyCheckResult::warn(
                        "deployment_verify_present",
                        SafetySeverity::Medium,
                        "plan applies a deployment without a verification step",
                    )
                } else {
                    SafetyCheckResult::pass("deployment_verify_present", "deployment verification present or not applicable")
                }
            },
        ),
        SafetyPolicy::new(
            "cost_anomaly",
            CheckPhase::PostExecution,
            SafetyCategory::Cost,
            |ctx| {
                let Some(estimated) = ctx.plan.estimated_cost_usd else {
                    return SafetyCheckResult::pass("cost_anomaly", "no cost estimate to compare against");
                };
                let actual: f64 = ctx
                    .results
                    .iter()
                    .filter_map(|r| r.outputs.get("actual_cost_usd").and_then(|v| v.as_f64()))
                    .sum();
                if actual == 0.0 {
                    return SafetyCheckResult::pass("cost_anomaly", "no actual cost reported");
                }
                let variance = ((actual - estimated) / estimated).abs();
                if variance > COST_ANOMALY_VARIANCE {
                    SafetyCheckResult::warn(
                        "cost_anomaly",
                        SafetySeverity::High,
                        format!("actual cost ${actual:.2} deviates {:.0}% from the ${estimated:.2} estimate", variance * 100.0),
                    )
                } else {
                    SafetyCheckResult::pass("cost_anomaly", "actual cost within expected variance")
                }
            },
        ),
        SafetyPolicy::new(
            "security_posture_score",
            CheckPhase::PostExecution,
            SafetyCategory::Security,
            |ctx| {
                let score = ctx
                    .results
                    .iter()
                    .filter_map(|r| r.outputs.get("best_practices_score").and_then(|v| v.as_i64()))
                    .min();
                match score {
                    Some(score) if score < MIN_SECURITY_POSTURE_SCORE => SafetyCheckResult::warn(
                        "security_posture_score",
                        SafetySeverity::High,
                        format!("security posture score {score} is below the {MIN_SECURITY_POSTURE_SCORE} floor"),
                    ),
                    _ => SafetyCheckResult::pass("security_posture_score", "security posture score within bounds"),
                }
            },
        ),
        SafetyPolicy::new(
            "no_production_delete_without_backup",
            CheckPhase::PostExecution,
            SafetyCategory::Availability,
            |ctx| {
                let unbacked_deletes: Vec<&str> = ctx
                    .results
                    .iter()
                    .filter(|r| !r.is_failure())
                    .filter_map(|r| ctx.plan.step(&r.step_id))
                    .filter(|s| s.action.contains("delete") || s.action.contains("destroy"))
                    .filter(|s| s.param_str("environment") == Some("production") && s.rollback_action.is_none())
                    .map(|s| s.id.as_str())
                    .collect();
                if unbacked_deletes.is_empty() {
                    SafetyCheckResult::pass(
                        "no_production_delete_without_backup",
                        "no unbacked production deletes executed",
                    )
                } else {
                    SafetyCheckResult::block(
                        "no_production_delete_without_backup",
                        SafetySeverity::Critical,
                        format!("production deletes without backup: {}", unbacked_deletes.join(", ")),
                    )
                }
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_shared::step::{Step, StepType};

    fn plan_with(steps: Vec<Step>) -> Plan {
        Plan::new("p1", "deploy vpc", steps)
    }

    #[test]
    fn registry_has_thirteen_builtin_policies() {
        let engine = SafetyEngine::new();
        assert_eq!(engine.policies.len(), 13);
    }

    #[test]
    fn production_goal_without_approval_blocks() {
        let engine = SafetyEngine::new();
        let mut plan = plan_with(vec![Step::new("s1", 1, StepType::Deploy, "apply_deployment")]);
        plan.goal = "deploy to production".to_string();
        plan.requires_approval = false;

        let config = Config::default();
        let results = engine.run_pre_execution_checks(&plan, &config);
        assert!(SafetyEngine::has_blocking_failure(&results));
    }

    #[test]
    fn destructive_step_with_rollback_action_passes() {
        let engine = SafetyEngine::new();
        let plan = plan_with(vec![Step::new("s1", 1, StepType::Deploy, "destroy_stack")
            .with_rollback_action("restore_stack")]);
        let config = Config::default();
        let results = engine.run_pre_execution_checks(&plan, &config);
        assert!(!SafetyEngine::has_blocking_failure(&results));
    }
}
