use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt::Display;

use crate::step::Step;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Approved,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

/// A named, dependency-annotated sequence of steps. Immutable after submission:
/// callers must not mutate a plan once handed to the executor, which owns
/// in-place updates to step status and timestamps from that point on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: PlanStatus,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost_usd: Option<f64>,
    pub steps: Vec<Step>,
}

impl Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan(id={}, status={:?}, steps={})",
            self.id,
            self.status,
            self.steps.len()
        )
    }
}

/// Errors that make a plan structurally unsafe to schedule.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("step ordinal {0} is not unique within the plan")]
    DuplicateOrdinal(u32),
    #[error("step {step} depends on unknown step id {dependency}")]
    UnknownDependency { step: String, dependency: String },
    #[error("circular dependency detected among steps: {0:?}")]
    Circular(Vec<String>),
}

impl Plan {
    pub fn new(id: impl Into<String>, goal: impl Into<String>, steps: Vec<Step>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            goal: goal.into(),
            created_at: now,
            updated_at: now,
            status: PlanStatus::Draft,
            risk_level: RiskLevel::Low,
            requires_approval: false,
            approver: None,
            estimated_duration_secs: None,
            estimated_cost_usd: None,
            steps,
        }
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Validates the invariants from the data model: unique ordinals, every
    /// dependency id resolves within the same plan, and the dependency graph
    /// is acyclic. Must be checked before the executor begins scheduling.
    pub fn validate_dag(&self) -> Result<(), PlanValidationError> {
        let mut seen_ordinals = HashSet::new();
        let ids: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();

        for step in &self.steps {
            if !seen_ordinals.insert(step.ordinal) {
                return Err(PlanValidationError::DuplicateOrdinal(step.ordinal));
            }
            for dep in step.depends_on.iter().flatten() {
                if !ids.contains(dep.as_str()) {
                    return Err(PlanValidationError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        self.detect_cycle()
    }

    fn detect_cycle(&self) -> Result<(), PlanValidationError> {
        // Kahn's algorithm: a plan is acyclic iff all steps can be peeled off
        // in topological order.
        let mut indegree: std::collections::HashMap<&str, usize> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.depends_on.as_ref().map_or(0, |d| d.len())))
            .collect();
        let mut dependents: std::collections::HashMap<&str, Vec<&str>> =
            std::collections::HashMap::new();
        for step in &self.steps {
            for dep in step.depends_on.iter().flatten() {
                dependents.entry(dep.as_str()).or_default().push(step.id.as_str());
            }
        }

        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut resolved = 0usize;

        while let Some(id) = queue.pop_front() {
            resolved += 1;
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(deg) = indegree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if resolved == self.steps.len() {
            Ok(())
        } else {
            let stuck = self
                .steps
                .iter()
                .map(|s| s.id.clone())
                .filter(|id| indegree.get(id.as_str()).copied().unwrap_or(0) > 0)
                .collect();
            Err(PlanValidationError::Circular(stuck))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepType};

    fn step(id: &str, ordinal: u32, depends_on: &[&str]) -> Step {
        let mut s = Step::new(id, ordinal, StepType::Validate, "validate_requirements");
        if !depends_on.is_empty() {
            s.depends_on = Some(depends_on.iter().map(|s| s.to_string()).collect());
        }
        s
    }

    #[test]
    fn validates_a_sequential_plan() {
        let plan = Plan::new(
            "p1",
            "deploy vpc",
            vec![step("s1", 1, &[]), step("s2", 2, &["s1"]), step("s3", 3, &["s2"])],
        );
        assert!(plan.validate_dag().is_ok());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let plan = Plan::new("p1", "x", vec![step("s1", 1, &["ghost"])]);
        assert_eq!(
            plan.validate_dag(),
            Err(PlanValidationError::UnknownDependency {
                step: "s1".into(),
                dependency: "ghost".into()
            })
        );
    }

    #[test]
    fn rejects_duplicate_ordinal() {
        let plan = Plan::new("p1", "x", vec![step("s1", 1, &[]), step("s2", 1, &[])]);
        assert_eq!(plan.validate_dag(), Err(PlanValidationError::DuplicateOrdinal(1)));
    }

    #[test]
    fn rejects_circular_dependency() {
        let plan = Plan::new(
            "p1",
            "x",
            vec![step("s1", 1, &["s2"]), step("s2", 2, &["s1"])],
        );
        assert!(matches!(
            plan.validate_dag(),
            Err(PlanValidationError::Circular(_))
        ));
    }
}
