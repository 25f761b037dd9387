use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::post_json;

#[derive(Debug, Clone, Serialize)]
pub struct FsWriteRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FsReadRequest {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FsResult {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub written: Option<bool>,
}

/// Wraps the FS tool service used by auxiliary operations (writing
/// generated component files to disk before a Terraform apply runs
/// against them).
pub struct FsAdapter {
    base_url: String,
}

impl FsAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    pub async fn write(&self, req: &FsWriteRequest) -> Result<FsResult, EngineError> {
        post_json(&self.base_url, "/api/fs/write", req).await
    }

    pub async fn read(&self, req: &FsReadRequest) -> Result<FsResult, EngineError> {
        post_json(&self.base_url, "/api/fs/read", req).await
    }
}
