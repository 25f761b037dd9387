use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;

use super::post_json;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TerraformRequest {
    pub directory: String,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl TerraformRequest {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanChanges {
    #[serde(default)]
    pub to_add: u32,
    #[serde(default)]
    pub to_change: u32,
    #[serde(default)]
    pub to_destroy: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,
}

/// Shared response shape for every Terraform endpoint. Each endpoint only
/// populates the fields relevant to it; the executor and drift detector
/// read whichever subset they need.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerraformResult {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub changes: Option<PlanChanges>,
    #[serde(default, rename = "resourceChanges")]
    pub resource_changes: Option<Vec<ResourceChange>>,
    #[serde(default)]
    pub diagnostics: Option<Vec<String>>,
    #[serde(default, rename = "resourcesCreated")]
    pub resources_created: Option<u32>,
    #[serde(default, rename = "resourcesUpdated")]
    pub resources_updated: Option<u32>,
    #[serde(default, rename = "resourcesDeleted")]
    pub resources_deleted: Option<u32>,
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub state: Option<String>,
}

pub struct TerraformAdapter {
    base_url: String,
}

impl TerraformAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    async fn call(&self, op: &str, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        post_json(&self.base_url, &format!("/api/terraform/{op}"), req).await
    }

    pub async fn init(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("init", req).await
    }

    pub async fn validate(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("validate", req).await
    }

    pub async fn plan(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("plan", req).await
    }

    pub async fn apply(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("apply", req).await
    }

    pub async fn destroy(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("destroy", req).await
    }

    pub async fn refresh(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("refresh", req).await
    }

    pub async fn show(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("show", req).await
    }

    pub async fn fmt(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("fmt", req).await
    }

    pub async fn output(&self, req: &TerraformRequest) -> Result<TerraformResult, EngineError> {
        self.call("output", req).await
    }
}
