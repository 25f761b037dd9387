use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;

use super::post_json;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub component_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResult {
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub best_practices_score: Option<u32>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub valid: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

pub struct GeneratorAdapter {
    base_url: String,
}

impl GeneratorAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResult, EngineError> {
        post_json(&self.base_url, "/api/generator/generate", req).await
    }

    pub async fn validate(&self, req: &GenerateRequest) -> Result<GenerateResult, EngineError> {
        post_json(&self.base_url, "/api/generator/validate", req).await
    }

    pub async fn analyze_best_practices(
        &self,
        req: &GenerateRequest,
    ) -> Result<GenerateResult, EngineError> {
        post_json(&self.base_url, "/api/generator/best-practices", req).await
    }

    pub async fn document(&self, req: &GenerateRequest) -> Result<GenerateResult, EngineError> {
        post_json(&self.base_url, "/api/generator/document", req).await
    }
}
