//! Rollback Manager (component D). Persists one `ExecutionState` per
//! execution -- the record the executor writes right after a successful
//! `apply_deployment` -- and reverses it on request. Persistence is
//! two-tier: an in-memory `DashMap` for fast lookups plus a durable
//! `<execution_id>.json` file under `Config::rollback_backup_dir`, so a
//! restart loses nothing the filesystem still has.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use orch_shared::rollback::{
    ExecutionState, HelmState, KubernetesState, RollbackAction, RollbackOptions, RollbackOutcome,
    RollbackState, RollbackStatus, TerraformState,
};

use crate::adapters::helm::{HelmAdapter, HelmRequest};
use crate::adapters::kubernetes::{K8sRequest, KubernetesAdapter};
use crate::adapters::terraform::{TerraformAdapter, TerraformRequest};
use crate::config::Config;
use crate::error::EngineError;

pub struct RollbackManager {
    states: DashMap<String, ExecutionState>,
    backup_dir: PathBuf,
    terraform: TerraformAdapter,
    kubernetes: KubernetesAdapter,
    helm: HelmAdapter,
}

impl RollbackManager {
    pub fn new(config: &Config) -> Self {
        Self {
            states: DashMap::new(),
            backup_dir: config.rollback_backup_dir.clone(),
            terraform: TerraformAdapter::new(config.terraform_service_url.clone()),
            kubernetes: KubernetesAdapter::new(config.kubernetes_service_url.clone()),
            helm: HelmAdapter::new(config.helm_service_url.clone()),
        }
    }

    fn state_path(&self, execution_id: &str) -> PathBuf {
        self.backup_dir.join(format!("{execution_id}.json"))
    }

    pub async fn save_execution_state(&self, state: ExecutionState) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(&self.backup_dir).await?;
        let path = self.state_path(&state.execution_id);
        let body = serde_json::to_vec_pretty(&state)?;
        tokio::fs::write(&path, body).await?;
        self.states.insert(state.execution_id.clone(), state);
        Ok(())
    }

    /// Checks the in-memory cache only. A state that only exists on disk
    /// (e.g. after a restart, before `get_execution_state` repopulates the
    /// cache) reads as "cannot rollback yet" until it is looked up once.
    pub fn can_rollback(&self, execution_id: &str) -> bool {
        self.states.contains_key(execution_id)
    }

    pub async fn get_execution_state(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionState>, EngineError> {
        if let Some(entry) = self.states.get(execution_id) {
            return Ok(Some(entry.clone()));
        }

        let path = self.state_path(execution_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let body = tokio::fs::read(&path).await?;
        let state: ExecutionState = serde_json::from_slice(&body)?;
        self.states.insert(execution_id.to_string(), state.clone());
        Ok(Some(state))
    }

    pub fn list_rollback_states(&self) -> Vec<ExecutionState> {
        let mut states: Vec<_> = self.states.iter().map(|e| e.value().clone()).collect();
        states.sort_by(|a, b| a.executed_at.cmp(&b.executed_at));
        states
    }

    pub async fn cleanup_old_states(&self, older_than: Duration) -> Result<usize, EngineError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());
        let stale: Vec<String> = self
            .states
            .iter()
            .filter(|e| e.value().executed_at < cutoff)
            .map(|e| e.key().clone())
            .collect();

        for execution_id in &stale {
            self.states.remove(execution_id);
            let path = self.state_path(execution_id);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tokio::fs::remove_file(&path).await?;
            }
        }

        Ok(stale.len())
    }

    pub async fn rollback(&self, options: RollbackOptions) -> Result<RollbackOutcome, EngineError> {
        let started_at = Utc::now();
        let state = self
            .get_execution_state(&options.execution_id)
            .await?
            .ok_or_else(|| EngineError::RollbackError(format!(
                "no execution state recorded for {}",
                options.execution_id
            )))?;

        let actions = match &state.state {
            RollbackState::Terraform(tf) => self.rollback_terraform(tf, &options).await,
            RollbackState::Kubernetes(k8s) => self.rollback_kubernetes(k8s, &options).await,
            RollbackState::Helm(helm) => self.rollback_helm(helm, &options).await,
        };

        let success = actions.iter().all(|a| a.success);
        let resources_affected = actions.len();
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0);

        Ok(RollbackOutcome {
            success,
            status: if success { RollbackStatus::Completed } else { RollbackStatus::Failed },
            execution_id: options.execution_id.clone(),
            resources_affected,
            output: None,
            error: if success {
                None
            } else {
                Some(format!(
                    "{} of {} rollback actions failed",
                    actions.iter().filter(|a| !a.success).count(),
                    resources_affected
                ))
            },
            duration_ms,
            actions,
        })
    }

    /// Three-tier fallback: restore the previous state and re-apply it;
    /// if that fails, destroy the deployed resources one at a time
    /// (tolerating partial failure); if any remain, fall back to a full
    /// directory destroy.
    async fn rollback_terraform(
        &self,
        tf: &TerraformState,
        options: &RollbackOptions,
    ) -> Vec<RollbackAction> {
        if options.dry_run {
            return vec![RollbackAction::ok(
                "would_restore_and_apply",
                tf.working_directory.clone(),
            )];
        }

        if let (Some(previous_state), Some(_backup_path)) = (&tf.previous_state, &tf.backup_path) {
            let req = TerraformRequest::new(tf.working_directory.clone())
                .with_option("restoreState", serde_json::Value::String(previous_state.clone()));
            if self.terraform.apply(&req).await.is_ok() {
                return vec![RollbackAction::ok("restore_and_apply", tf.working_directory.clone())];
            }
        }

        let mut actions = Vec::new();
        let mut all_targeted_ok = true;
        for resource in &tf.deployed_resources {
            let req = TerraformRequest::new(tf.working_directory.clone())
                .with_option("target", serde_json::Value::String(resource.clone()));
            match self.terraform.destroy(&req).await {
                Ok(_) => actions.push(RollbackAction::ok("targeted_destroy", resource.clone())),
                Err(e) => {
                    all_targeted_ok = false;
                    actions.push(RollbackAction::failed(
                        "targeted_destroy",
                        resource.clone(),
                        e.to_string(),
                    ));
                }
            }
        }

        if all_targeted_ok && !tf.deployed_resources.is_empty() {
            return actions;
        }

        let req = TerraformRequest::new(tf.working_directory.clone());
        match self.terraform.destroy(&req).await {
            Ok(_) => actions.push(RollbackAction::ok("full_destroy", tf.working_directory.clone())),
            Err(e) => actions.push(RollbackAction::failed(
                "full_destroy",
                tf.working_directory.clone(),
                e.to_string(),
            )),
        }
        actions
    }

    /// Deletes each deployed resource individually; a failure on one
    /// resource does not stop the rest from being attempted.
    async fn rollback_kubernetes(
        &self,
        k8s: &KubernetesState,
        options: &RollbackOptions,
    ) -> Vec<RollbackAction> {
        if options.dry_run {
            return k8s
                .deployed_resources
                .iter()
                .map(|r| RollbackAction::ok("would_delete", r.clone()))
                .collect();
        }

        let mut actions = Vec::new();
        for resource in &k8s.deployed_resources {
            if let Some(targets) = &options.targets {
                if !targets.contains(resource) {
                    actions.push(RollbackAction::ok("skip", resource.clone()));
                    continue;
                }
            }

            let mut req = K8sRequest::new(resource.clone());
            if let Some(ns) = &k8s.namespace {
                req = req.with_namespace(ns.clone());
            }
            match self.kubernetes.delete(&req).await {
                Ok(_) => actions.push(RollbackAction::ok("delete", resource.clone())),
                Err(e) => actions.push(RollbackAction::failed("delete", resource.clone(), e.to_string())),
            }
        }
        actions
    }

    /// Requires a release name -- enforced at the type level by
    /// `HelmState`, so there is no runtime "missing release name" branch
    /// to handle here.
    async fn rollback_helm(&self, helm: &HelmState, options: &RollbackOptions) -> Vec<RollbackAction> {
        if options.dry_run {
            return vec![RollbackAction::ok(
                format!("would_rollback_to_revision_{}", helm.previous_revision),
                helm.release_name.clone(),
            )];
        }

        let mut req = HelmRequest::new(helm.release_name.clone())
            .with_revision(helm.previous_revision);
        if let Some(ns) = &helm.namespace {
            req = req.with_namespace(ns.clone());
        }

        match self.helm.rollback(&req).await {
            Ok(_) => vec![RollbackAction::ok("helm_rollback", helm.release_name.clone())],
            Err(e) => vec![RollbackAction::failed(
                "helm_rollback",
                helm.release_name.clone(),
                e.to_string(),
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_shared::rollback::{HelmState, RollbackOptions};

    fn test_config(dir: &Path) -> Config {
        let mut cfg = Config::default();
        cfg.rollback_backup_dir = dir.to_path_buf();
        cfg
    }

    #[tokio::test]
    async fn save_then_get_round_trips_through_disk_cache() {
        let dir = std::env::temp_dir().join(format!("orch-rollback-test-{}", uuid::Uuid::new_v4()));
        let manager = RollbackManager::new(&test_config(&dir));

        let state = ExecutionState {
            execution_id: "exec-1".to_string(),
            executed_at: Utc::now(),
            state: RollbackState::Helm(HelmState {
                working_directory: "/charts/app".to_string(),
                namespace: Some("default".to_string()),
                release_name: "app".to_string(),
                previous_revision: 3,
            }),
        };
        manager.save_execution_state(state).await.unwrap();

        assert!(manager.can_rollback("exec-1"));
        let fetched = manager.get_execution_state("exec-1").await.unwrap();
        assert!(fetched.is_some());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn rollback_without_recorded_state_is_an_error_not_a_panic() {
        let dir = std::env::temp_dir().join(format!("orch-rollback-test-{}", uuid::Uuid::new_v4()));
        let manager = RollbackManager::new(&test_config(&dir));
        let result = manager.rollback(RollbackOptions::new("missing-exec")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dry_run_helm_rollback_makes_no_adapter_calls_and_succeeds() {
        let dir = std::env::temp_dir().join(format!("orch-rollback-test-{}", uuid::Uuid::new_v4()));
        let manager = RollbackManager::new(&test_config(&dir));

        let state = ExecutionState {
            execution_id: "exec-2".to_string(),
            executed_at: Utc::now(),
            state: RollbackState::Helm(HelmState {
                working_directory: "/charts/app".to_string(),
                namespace: None,
                release_name: "app".to_string(),
                previous_revision: 2,
            }),
        };
        manager.save_execution_state(state).await.unwrap();

        let outcome = manager
            .rollback(RollbackOptions::new("exec-2").dry_run(true))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.actions.len(), 1);
        assert!(outcome.actions[0].action.starts_with("would_rollback_to_revision_"));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
