use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Network,
    System,
    File,
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Display status derived from severity at normalization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub source: LogSource,
    pub severity: Severity,
    pub message: String,
    pub raw_data: Option<serde_json::Value>,
    pub ip: Option<String>,
    pub hash: String,
    pub status: LogStatus,
}

impl Severity {
    /// Maps a raw severity string onto the closed set; anything
    /// unrecognized is treated as low.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("critical") => Severity::Critical,
            Some("high") => Severity::High,
            Some("medium") => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn display_status(self) -> LogStatus {
        match self {
            Severity::Critical => LogStatus::Error,
            Severity::High => LogStatus::Warning,
            Severity::Medium => LogStatus::Info,
            Severity::Low => LogStatus::Success,
        }
    }
}

impl LogSource {
    /// Maps a raw `log_type` onto the closed source set; unknown types
    /// fall back to System.
    pub fn from_log_type(raw: Option<&str>) -> Self {
        match raw {
            Some("network") => LogSource::Network,
            Some("file") => LogSource::File,
            Some("auth") => LogSource::Auth,
            _ => LogSource::System,
        }
    }
}
