use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::log::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Active,
    Investigating,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    CpuSpike,
    NetworkAnomaly,
    FileChange,
    AuthFailure,
    SuspiciousActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: String,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub severity: Severity,
    pub risk_score: u8,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub xai_reason: String,
    pub status: AnomalyStatus,
    pub related_logs: Vec<String>,
}

impl AnomalyStatus {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("resolved") => AnomalyStatus::Resolved,
            Some("investigating") => AnomalyStatus::Investigating,
            Some("dismissed") => AnomalyStatus::Dismissed,
            _ => AnomalyStatus::Active,
        }
    }

    /// Wire value for the status PATCH query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyStatus::Active => "active",
            AnomalyStatus::Investigating => "investigating",
            AnomalyStatus::Resolved => "resolved",
            AnomalyStatus::Dismissed => "dismissed",
        }
    }
}

impl AnomalyType {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("cpu_spike") => AnomalyType::CpuSpike,
            Some("network_anomaly") => AnomalyType::NetworkAnomaly,
            Some("file_change") => AnomalyType::FileChange,
            Some("auth_failure") => AnomalyType::AuthFailure,
            _ => AnomalyType::SuspiciousActivity,
        }
    }
}

/// Per-status counts plus average risk over the live registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyStats {
    pub active: usize,
    pub investigating: usize,
    pub resolved: usize,
    pub dismissed: usize,
    pub avg_risk: u8,
}
