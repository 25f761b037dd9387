//! The fixed action dispatch table. Every handler is an async function over
//! `(step, execution_id)` returning `{outputs, artifacts}`; an unrecognized
//! action name is a `StepExecutionError`, never a panic.

use std::collections::BTreeMap;
use std::sync::Arc;

use orch_shared::execution::Artifact;
use orch_shared::step::Step;

use crate::adapters::generator::{GenerateRequest, GeneratorAdapter};
use crate::adapters::kubernetes::KubernetesAdapter;
use crate::adapters::terraform::{TerraformAdapter, TerraformRequest};
use crate::error::EngineError;
use crate::rollback::RollbackManager;

const KNOWN_PROVIDERS: &[&str] = &["aws", "azure", "gcp"];

pub struct StepOutcome {
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub artifacts: Vec<Artifact>,
}

pub struct ActionContext {
    pub terraform: TerraformAdapter,
    pub kubernetes: KubernetesAdapter,
    pub helm: crate::adapters::helm::HelmAdapter,
    pub generator: GeneratorAdapter,
    pub rollback: Arc<RollbackManager>,
}

impl ActionContext {
    pub async fn dispatch(&self, step: &Step, execution_id: &str) -> Result<StepOutcome, EngineError> {
        match step.action.as_str() {
            "validate_requirements" => validate_requirements(step),
            "generate_component" => generate_component(step, &self.generator).await,
            "validate_generated_code" => validate_generated_code(step, &self.generator).await,
            "apply_best_practices" => apply_best_practices(step, &self.generator).await,
            "plan_deployment" => plan_deployment(step, &self.terraform).await,
            "apply_deployment" => {
                apply_deployment(step, execution_id, &self.terraform, &self.rollback).await
            }
            "verify_deployment" => verify_deployment(step, &self.terraform, &self.kubernetes).await,
            "generate_documentation" => generate_documentation(step, &self.generator).await,
            other => Err(EngineError::StepExecutionError(format!(
                "unknown action: {other}"
            ))),
        }
    }
}

fn validate_requirements(step: &Step) -> Result<StepOutcome, EngineError> {
    let provider = step.param_str("provider").unwrap_or("");
    if !KNOWN_PROVIDERS.contains(&provider) {
        return Err(EngineError::NonRetryable(format!(
            "unknown provider: {provider}"
        )));
    }

    let components = step
        .parameters
        .get("components")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(vec![]));

    let mut outputs = BTreeMap::new();
    outputs.insert("validated".to_string(), serde_json::Value::Bool(true));
    outputs.insert(
        "provider".to_string(),
        serde_json::Value::String(provider.to_string()),
    );
    outputs.insert("components".to_string(), components);

    Ok(StepOutcome {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn generate_component(
    step: &Step,
    generator: &GeneratorAdapter,
) -> Result<StepOutcome, EngineError> {
    let req = GenerateRequest {
        component_type: step.param_str("component_type").unwrap_or("generic").to_string(),
        parameters: step.parameters.clone(),
    };
    let result = generator.generate(&req).await?;

    let mut outputs = BTreeMap::new();
    outputs.insert(
        "files_generated".to_string(),
        serde_json::Value::from(result.files.len()),
    );

    let artifacts = result
        .files
        .iter()
        .map(|f| Artifact {
            name: f.path.clone(),
            location: f.path.clone(),
            kind: Some("generated_file".to_string()),
        })
        .collect();

    Ok(StepOutcome { outputs, artifacts })
}

async fn validate_generated_code(
    step: &Step,
    generator: &GeneratorAdapter,
) -> Result<StepOutcome, EngineError> {
    let req = GenerateRequest {
        component_type: step.param_str("component_type").unwrap_or("generic").to_string(),
        parameters: step.parameters.clone(),
    };
    let result = generator.validate(&req).await?;

    if result.valid == Some(false) {
        return Err(EngineError::NonRetryable(format!(
            "generated code failed validation: {}",
            result.issues.join("; ")
        )));
    }

    let mut outputs = BTreeMap::new();
    outputs.insert("valid".to_string(), serde_json::Value::Bool(true));
    outputs.insert(
        "issues".to_string(),
        serde_json::Value::from(result.issues),
    );
    Ok(StepOutcome {
        outputs,
        artifacts: Vec::new(),
    })
}

/// Auxiliary operation: unavailability of the generator service falls back
/// to a deterministic mock score rather than failing the step.
async fn apply_best_practices(
    step: &Step,
    generator: &GeneratorAdapter,
) -> Result<StepOutcome, EngineError> {
    let req = GenerateRequest {
        component_type: step.param_str("component_type").unwrap_or("generic").to_string(),
        parameters: step.parameters.clone(),
    };

    let (score, mocked) = match generator.analyze_best_practices(&req).await {
        Ok(result) => (result.best_practices_score.unwrap_or(80), false),
        Err(_) => (80, true),
    };

    let mut outputs = BTreeMap::new();
    outputs.insert("best_practices_score".to_string(), serde_json::Value::from(score));
    outputs.insert("mocked".to_string(), serde_json::Value::Bool(mocked));
    Ok(StepOutcome {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn plan_deployment(
    step: &Step,
    terraform: &TerraformAdapter,
) -> Result<StepOutcome, EngineError> {
    let directory = step.param_str("directory").unwrap_or(".").to_string();
    let req = TerraformRequest::new(directory.clone());

    // Auxiliary: `terraform init` ahead of planning falls back to a mock
    // success so an unreachable adapter doesn't block the (primary) plan.
    if terraform.init(&req).await.is_err() {
        tracing::warn!(%directory, "terraform init unavailable, proceeding with mock init result");
    }

    let result = terraform.plan(&req).await?;
    let changes = result.changes.unwrap_or_default();

    let mut outputs = BTreeMap::new();
    outputs.insert("to_add".to_string(), serde_json::Value::from(changes.to_add));
    outputs.insert("to_change".to_string(), serde_json::Value::from(changes.to_change));
    outputs.insert("to_destroy".to_string(), serde_json::Value::from(changes.to_destroy));
    if let Some(output) = result.output {
        outputs.insert("plan_output".to_string(), serde_json::Value::String(output));
    }

    Ok(StepOutcome {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn apply_deployment(
    step: &Step,
    execution_id: &str,
    terraform: &TerraformAdapter,
    rollback: &RollbackManager,
) -> Result<StepOutcome, EngineError> {
    let directory = step.param_str("directory").unwrap_or(".").to_string();
    let req = TerraformRequest::new(directory.clone());
    let result = terraform.apply(&req).await?;

    let state = orch_shared::rollback::ExecutionState {
        execution_id: execution_id.to_string(),
        executed_at: chrono::Utc::now(),
        state: orch_shared::rollback::RollbackState::Terraform(orch_shared::rollback::TerraformState {
            working_directory: directory,
            previous_state: result.state.clone(),
            backup_path: None,
            deployed_resources: result
                .resource_changes
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.address)
                .collect(),
        }),
    };
    rollback.save_execution_state(state).await?;

    let mut outputs = BTreeMap::new();
    outputs.insert(
        "resources_created".to_string(),
        serde_json::Value::from(result.resources_created.unwrap_or(0)),
    );
    outputs.insert(
        "resources_updated".to_string(),
        serde_json::Value::from(result.resources_updated.unwrap_or(0)),
    );
    outputs.insert(
        "resources_deleted".to_string(),
        serde_json::Value::from(result.resources_deleted.unwrap_or(0)),
    );

    Ok(StepOutcome {
        outputs,
        artifacts: Vec::new(),
    })
}

async fn verify_deployment(
    step: &Step,
    terraform: &TerraformAdapter,
    kubernetes: &KubernetesAdapter,
) -> Result<StepOutcome, EngineError> {
    let provider = step.param_str("provider").unwrap_or("terraform");

    let mut outputs = BTreeMap::new();
    if provider == "kubernetes" {
        let req = crate::adapters::kubernetes::K8sRequest::new(
            step.param_str("resource").unwrap_or("deployment").to_string(),
        );
        let result = kubernetes.get(&req).await?;
        outputs.insert(
            "verified".to_string(),
            serde_json::Value::Bool(result.resource.is_some()),
        );
    } else {
        let directory = step.param_str("directory").unwrap_or(".").to_string();
        let req = TerraformRequest::new(directory);
        let result = terraform.show(&req).await?;
        outputs.insert("verified".to_string(), serde_json::Value::Bool(true));
        if let Some(state) = result.state {
            outputs.insert("state".to_string(), serde_json::Value::String(state));
        }
    }

    Ok(StepOutcome {
        outputs,
        artifacts: Vec::new(),
    })
}

/// Auxiliary operation: documentation generation falls back to a mock
/// placeholder on adapter unavailability.
async fn generate_documentation(
    step: &Step,
    generator: &GeneratorAdapter,
) -> Result<StepOutcome, EngineError> {
    let req = GenerateRequest {
        component_type: step.param_str("component_type").unwrap_or("generic").to_string(),
        parameters: step.parameters.clone(),
    };

    let (doc, mocked) = match generator.document(&req).await {
        Ok(result) => (
            result.documentation.unwrap_or_else(|| "(no documentation returned)".to_string()),
            false,
        ),
        Err(_) => ("(mock documentation: generator unavailable)".to_string(), true),
    };

    let mut outputs = BTreeMap::new();
    outputs.insert("documentation".to_string(), serde_json::Value::String(doc.clone()));
    outputs.insert("mocked".to_string(), serde_json::Value::Bool(mocked));

    let artifacts = vec![Artifact {
        name: "README.md".to_string(),
        location: "README.md".to_string(),
        kind: Some("documentation".to_string()),
    }];

    Ok(StepOutcome { outputs, artifacts })
}
