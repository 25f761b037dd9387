//! Thin JSON-over-HTTP wrappers over the external tool services
//! (Terraform, Kubernetes, Helm, Generator, FS, State). Every adapter
//! speaks the same envelope shape and the same failure contract: a
//! network or decode error becomes `EngineError::Adapter`, never a panic.

pub mod fs;
pub mod generator;
pub mod helm;
pub mod kubernetes;
pub mod state;
pub mod terraform;

use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::error::EngineError;

static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client configuration is static and must always build")
});

pub fn http_client() -> reqwest::Client {
    SHARED_CLIENT.clone()
}

#[derive(Debug, serde::Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// POSTs `body` to `{base_url}{path}` and unwraps the `{success, data,
/// error?}` envelope every tool service returns. A `success: false`
/// envelope is surfaced the same way a transport failure is -- both are
/// `EngineError::Adapter`, since callers treat them identically (retry or
/// fall back).
pub async fn post_json<B: Serialize, T: DeserializeOwned>(
    base_url: &str,
    path: &str,
    body: &B,
) -> Result<T, EngineError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    let response = http_client()
        .post(&url)
        .json(body)
        .send()
        .await
        .map_err(|e| EngineError::Adapter(format!("{path}: {e}")))?;

    if !response.status().is_success() {
        return Err(EngineError::Adapter(format!(
            "{path}: http status {}",
            response.status()
        )));
    }

    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| EngineError::Adapter(format!("{path}: decode failed: {e}")))?;

    if !envelope.success {
        return Err(EngineError::Adapter(
            envelope.error.unwrap_or_else(|| format!("{path}: request failed")),
        ));
    }

    envelope
        .data
        .ok_or_else(|| EngineError::Adapter(format!("{path}: empty response data")))
}

/// Probes the adapter's base URL with a bounded-timeout `GET /healthz`.
/// Used by callers that want to decide up front whether to attempt a
/// primary operation or fall straight through to a mock fallback.
pub async fn health_check(base_url: &str, timeout: Duration) -> bool {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    http_client()
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map(|resp| resp.status().is_success())
        .unwrap_or(false)
}
