use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::post_json;

#[derive(Debug, Clone, Serialize)]
pub struct HelmRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_values: Option<bool>,
}

impl HelmRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            revision: None,
            dry_run: None,
            reuse_values: None,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    pub fn with_revision(mut self, revision: i64) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelmResult {
    #[serde(default)]
    pub revision: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct HelmAdapter {
    base_url: String,
}

impl HelmAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub async fn upgrade(&self, req: &HelmRequest) -> Result<HelmResult, EngineError> {
        post_json(&self.base_url, "/api/helm/upgrade", req).await
    }

    pub async fn rollback(&self, req: &HelmRequest) -> Result<HelmResult, EngineError> {
        post_json(&self.base_url, "/api/helm/rollback", req).await
    }
}
