//! Maps raw payloads from the telemetry service onto the canonical types.
//!
//! The REST endpoints and the alert stream describe the same records with
//! overlapping but inconsistent field names, so all of that variability is
//! absorbed here: one priority list per canonical field, closed-set
//! validation for every enum, and a hard gate on timestamps. A record that
//! fails the gate is dropped, never stored half-built.

use std::sync::OnceLock;

use base64::engine::general_purpose;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::types::anomaly::{Anomaly, AnomalyStatus, AnomalyType};
use crate::types::log::{LogEntry, LogSource, Severity};
use crate::types::timeline::{EventCategory, TimelineEvent};

/// Epoch values at or above this are treated as milliseconds.
const EPOCH_MILLIS_CUTOFF: i64 = 100_000_000_000;

fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

/// Accepts RFC 3339 strings, naive ISO 8601 strings (assumed UTC, the
/// backend serializes naive datetimes), and numeric epoch seconds or
/// milliseconds. Anything else is a parse failure.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => {
            let epoch = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if epoch >= EPOCH_MILLIS_CUTOFF {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            }
        }
        _ => None,
    }
}

/// `raw_data` arrives either as a JSON object or as a JSON-encoded string.
/// A string that fails to parse is treated as absent.
pub fn parse_raw_data(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Null => None,
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

/// Display fingerprint for a log entry, derived from `(id, timestamp)`.
/// Deterministic and non-cryptographic; never used for deduplication.
pub fn log_hash(id: &str, timestamp: &DateTime<Utc>) -> String {
    let mut encoded =
        general_purpose::STANDARD.encode(format!("{}-{}", id, timestamp.to_rfc3339()));
    encoded.truncate(16);
    encoded
}

/// First IPv4 literal appearing in the message, if any.
pub fn extract_ip(message: &str) -> Option<String> {
    static IP_RE: OnceLock<Regex> = OnceLock::new();
    let re = IP_RE.get_or_init(|| {
        Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("static pattern")
    });
    re.find(message).map(|m| m.as_str().to_string())
}

fn id_field(raw: &Value) -> Option<String> {
    match raw.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn build_log(raw: &Value, id: String, timestamp: DateTime<Utc>) -> LogEntry {
    let log_type = str_field(raw, "log_type");
    let severity = Severity::from_raw(str_field(raw, "severity"));
    let message = str_field(raw, "message").unwrap_or_default().to_string();
    let hash = log_hash(&id, &timestamp);

    LogEntry {
        ip: extract_ip(&message),
        hash,
        event_type: log_type.unwrap_or("system").to_string(),
        source: LogSource::from_log_type(log_type),
        severity,
        status: severity.display_status(),
        message,
        raw_data: parse_raw_data(raw.get("raw_data")),
        id,
        timestamp,
    }
}

/// Normalize one row of `GET /api/logs/explorer`. Rows without a parseable
/// timestamp or id are dropped.
pub fn normalize_rest_log(raw: &Value) -> Option<LogEntry> {
    let id = id_field(raw)?;
    let timestamp = parse_timestamp(raw.get("timestamp"))?;
    Some(build_log(raw, id, timestamp))
}

/// Normalize a log-shaped stream frame. A frame may legitimately omit the
/// timestamp (the arrival instant is used) and the id (one is minted), but
/// a present timestamp that fails to parse drops the frame.
pub fn normalize_stream_log(raw: &Value, received_at: DateTime<Utc>) -> Option<LogEntry> {
    let timestamp = match raw.get("timestamp") {
        None | Some(Value::Null) => received_at,
        field => parse_timestamp(field)?,
    };
    let id = id_field(raw).unwrap_or_else(|| Uuid::new_v4().to_string());
    Some(build_log(raw, id, timestamp))
}

/// Normalize one row of `GET /api/anomalies`. The registry is replaced
/// wholesale on every refresh, so this is lenient: every field has a
/// documented default, including the timestamp.
pub fn normalize_anomaly(raw: &Value) -> Anomaly {
    let risk_score = raw
        .get("risk_score")
        .or_else(|| raw.get("riskScore"))
        .and_then(Value::as_f64)
        .map(|score| score.clamp(0.0, 100.0) as u8)
        .unwrap_or(60);

    let related_logs = raw
        .get("related_logs")
        .or_else(|| raw.get("relatedLogs"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Anomaly {
        id: id_field(raw).unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: str_field(raw, "title")
            .or_else(|| str_field(raw, "anomaly_type"))
            .or_else(|| str_field(raw, "log_type"))
            .unwrap_or("Security Anomaly")
            .to_string(),
        description: str_field(raw, "description")
            .or_else(|| str_field(raw, "details"))
            .or_else(|| str_field(raw, "message"))
            .unwrap_or("Suspicious behavior detected")
            .to_string(),
        timestamp: parse_timestamp(raw.get("timestamp")).unwrap_or_else(Utc::now),
        source: str_field(raw, "source").unwrap_or("system").to_string(),
        severity: Severity::from_raw(str_field(raw, "severity")),
        risk_score,
        anomaly_type: AnomalyType::from_raw(
            str_field(raw, "type").or_else(|| str_field(raw, "anomaly_type")),
        ),
        xai_reason: str_field(raw, "xai_reason")
            .or_else(|| str_field(raw, "xaiReason"))
            .unwrap_or("Model detected abnormal deviation from baseline behavior")
            .to_string(),
        status: AnomalyStatus::from_raw(str_field(raw, "status")),
        related_logs,
    }
}

/// Normalize one row of `GET /api/timeline`. Rows without a parseable
/// timestamp are dropped.
pub fn normalize_timeline_event(raw: &Value) -> Option<TimelineEvent> {
    let timestamp = parse_timestamp(raw.get("timestamp"))?;
    let log_type = str_field(raw, "log_type");

    let category = EventCategory::from_raw(str_field(raw, "category")).unwrap_or_else(|| {
        if raw.get("anomaly_id").is_some() || raw.get("anomalyId").is_some() {
            EventCategory::Incident
        } else {
            match log_type {
                Some("access") => EventCategory::Access,
                Some("change") => EventCategory::Change,
                _ => EventCategory::Alert,
            }
        }
    });

    let details = str_field(raw, "details")
        .map(str::to_string)
        .or_else(|| match raw.get("raw_data") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .or_else(|| str_field(raw, "message").map(str::to_string))
        .unwrap_or_else(|| "No additional details".to_string());

    Some(TimelineEvent {
        id: id_field(raw).unwrap_or_else(|| Uuid::new_v4().to_string()),
        title: str_field(raw, "title")
            .map(str::to_string)
            .or_else(|| str_field(raw, "event_type").map(str::to_string))
            .or_else(|| log_type.map(str::to_uppercase))
            .unwrap_or_else(|| "Timeline Event".to_string()),
        timestamp,
        description: str_field(raw, "description")
            .or_else(|| str_field(raw, "message"))
            .unwrap_or("Event recorded")
            .to_string(),
        event_type: str_field(raw, "type")
            .or_else(|| str_field(raw, "event_type"))
            .or(log_type)
            .unwrap_or("system")
            .to_string(),
        severity: Severity::from_raw(str_field(raw, "severity")),
        category,
        details,
        source: str_field(raw, "source").unwrap_or("system").to_string(),
    })
}
