use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::post_json;

#[derive(Debug, Clone, Serialize)]
pub struct K8sRequest {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl K8sRequest {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            namespace: None,
            manifest: None,
            dry_run: None,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(ns.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct K8sResult {
    #[serde(default)]
    pub applied: Option<bool>,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default)]
    pub resource: Option<serde_json::Value>,
}

pub struct KubernetesAdapter {
    base_url: String,
}

impl KubernetesAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub async fn apply(&self, req: &K8sRequest) -> Result<K8sResult, EngineError> {
        post_json(&self.base_url, "/api/k8s/apply", req).await
    }

    pub async fn delete(&self, req: &K8sRequest) -> Result<K8sResult, EngineError> {
        post_json(&self.base_url, "/api/k8s/delete", req).await
    }

    pub async fn get(&self, req: &K8sRequest) -> Result<K8sResult, EngineError> {
        post_json(&self.base_url, "/api/k8s/get", req).await
    }
}
