use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::log::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Incident,
    Alert,
    Change,
    Access,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: Severity,
    pub category: EventCategory,
    pub details: String,
    pub source: String,
}

impl EventCategory {
    pub fn from_raw(raw: Option<&str>) -> Option<Self> {
        match raw {
            Some("incident") => Some(EventCategory::Incident),
            Some("alert") => Some(EventCategory::Alert),
            Some("change") => Some(EventCategory::Change),
            Some("access") => Some(EventCategory::Access),
            _ => None,
        }
    }
}
