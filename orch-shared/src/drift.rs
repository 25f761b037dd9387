use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl DriftType {
    pub fn label(&self) -> &'static str {
        match self {
            DriftType::Added => "added",
            DriftType::Removed => "removed",
            DriftType::Modified => "modified",
            DriftType::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftItem {
    pub resource_id: String,
    pub resource_type: String,
    pub resource_name: String,
    pub drift_type: DriftType,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub description: String,
    pub remediation: String,
    pub auto_fixable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDrift {
    pub address: String,
    pub provider: String,
    pub resource_type: String,
    pub drifts: Vec<DriftItem>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total_resources: usize,
    pub drifted_resources: usize,
    pub unchanged_resources: usize,
    pub by_drift_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub auto_fixable: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub id: String,
    pub provider: String,
    pub workdir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub summary: DriftSummary,
    pub resources: Vec<ResourceDrift>,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RemediationImpact {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationPlan {
    pub update: Vec<DriftItem>,
    pub create: Vec<DriftItem>,
    pub destroy: Vec<DriftItem>,
    pub manual: Vec<DriftItem>,
    pub impact: Option<RemediationImpact>,
    pub warnings: Vec<String>,
}
