//! Derives the system-health projection from the canonical log set.
//!
//! Always the single freshest metrics-bearing entry, never an average over
//! several; fields a payload omits keep their previous value so a partial
//! snapshot can never reset the projection to zero.

use std::collections::VecDeque;

use serde_json::Value;

use crate::types::log::LogEntry;
use crate::types::metrics::SystemMetrics;

/// Log `event_type` that marks a metrics-bearing entry.
pub const METRICS_EVENT_TYPE: &str = "system_metrics";

/// The metrics-bearing entry with the maximum `(timestamp, id)` pair.
/// Comparing the id second makes the winner reproducible when two
/// snapshots share a timestamp.
pub fn latest_metrics_log(logs: &VecDeque<LogEntry>) -> Option<&LogEntry> {
    logs.iter()
        .filter(|entry| entry.event_type == METRICS_EVENT_TYPE && entry.raw_data.is_some())
        .max_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Mean of all disk devices' `used_percent`, rounded to the nearest
/// integer. An absent or empty device map yields 0.
pub fn mean_disk_used_percent(raw_data: &Value) -> f64 {
    let Some(disks) = raw_data.get("disks").and_then(Value::as_object) else {
        return 0.0;
    };
    if disks.is_empty() {
        return 0.0;
    }
    let sum: f64 = disks
        .values()
        .map(|device| {
            device
                .get("used_percent")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        })
        .sum();
    (sum / disks.len() as f64).round()
}

/// Recompute the projection. `prev` supplies every value the freshest
/// payload does not carry; with no metrics-bearing entry at all, only the
/// host count moves.
pub fn derive(logs: &VecDeque<LogEntry>, host_count: u64, prev: &SystemMetrics) -> SystemMetrics {
    let mut next = prev.clone();
    next.network_connections = host_count;

    let Some(latest) = latest_metrics_log(logs) else {
        return next;
    };
    let Some(data) = latest.raw_data.as_ref() else {
        return next;
    };

    next.cpu = data
        .get("cpu_percent")
        .and_then(Value::as_f64)
        .unwrap_or(prev.cpu);
    next.memory = data
        .get("memory_percent")
        .and_then(Value::as_f64)
        .unwrap_or(prev.memory);
    next.uptime = data
        .get("uptime_seconds")
        .and_then(Value::as_f64)
        .map(|secs| secs as u64)
        .unwrap_or(prev.uptime);
    next.disk = mean_disk_used_percent(data);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_rest_log;
    use serde_json::json;

    fn metrics_entry(id: &str, ts: &str, raw_data: Value) -> LogEntry {
        normalize_rest_log(&json!({
            "id": id,
            "timestamp": ts,
            "log_type": "system_metrics",
            "severity": "low",
            "message": "System metrics snapshot",
            "raw_data": raw_data
        }))
        .unwrap()
    }

    #[test]
    fn freshest_metrics_entry_wins() {
        let mut logs = VecDeque::new();
        logs.push_back(metrics_entry(
            "1",
            "2024-01-01T00:00:00Z",
            json!({"cpu_percent": 10.0}),
        ));
        logs.push_back(metrics_entry(
            "2",
            "2024-01-01T00:05:00Z",
            json!({"cpu_percent": 90.0}),
        ));
        let derived = derive(&logs, 0, &SystemMetrics::default());
        assert_eq!(derived.cpu, 90.0);
    }

    #[test]
    fn timestamp_tie_breaks_on_id_deterministically() {
        let ts = "2024-01-01T00:00:00Z";
        let five = metrics_entry("5", ts, json!({"cpu_percent": 5.0}));
        let nine = metrics_entry("9", ts, json!({"cpu_percent": 9.0}));

        // Same winner regardless of buffer order
        let mut forward = VecDeque::new();
        forward.push_back(five.clone());
        forward.push_back(nine.clone());
        let mut reverse = VecDeque::new();
        reverse.push_back(nine);
        reverse.push_back(five);

        assert_eq!(latest_metrics_log(&forward).unwrap().id, "9");
        assert_eq!(latest_metrics_log(&reverse).unwrap().id, "9");
    }

    #[test]
    fn disk_is_mean_of_device_used_percent() {
        let data = json!({"disks": {"a": {"used_percent": 40.0}, "b": {"used_percent": 60.0}}});
        assert_eq!(mean_disk_used_percent(&data), 50.0);
    }

    #[test]
    fn disk_defaults_to_zero_without_devices() {
        assert_eq!(mean_disk_used_percent(&json!({"disks": {}})), 0.0);
        assert_eq!(mean_disk_used_percent(&json!({})), 0.0);
    }

    #[test]
    fn disk_mean_rounds_to_nearest_integer() {
        let data = json!({"disks": {
            "a": {"used_percent": 33.0},
            "b": {"used_percent": 33.0},
            "c": {"used_percent": 34.0}
        }});
        assert_eq!(mean_disk_used_percent(&data), 33.0);
    }

    #[test]
    fn missing_fields_keep_previous_values() {
        let prev = SystemMetrics {
            cpu: 42.0,
            memory: 60.0,
            disk: 10.0,
            network_connections: 1,
            active_processes: 7,
            uptime: 5000,
        };
        let mut logs = VecDeque::new();
        logs.push_back(metrics_entry(
            "1",
            "2024-01-01T00:00:00Z",
            json!({"memory_percent": 75.0}),
        ));
        let derived = derive(&logs, 3, &prev);
        assert_eq!(derived.cpu, 42.0);
        assert_eq!(derived.memory, 75.0);
        assert_eq!(derived.uptime, 5000);
        assert_eq!(derived.active_processes, 7);
        assert_eq!(derived.network_connections, 3);
        // disk is always recomputed from the payload's device map
        assert_eq!(derived.disk, 0.0);
    }

    #[test]
    fn no_metrics_entry_carries_projection_forward() {
        let prev = SystemMetrics {
            cpu: 33.0,
            memory: 44.0,
            disk: 55.0,
            network_connections: 2,
            active_processes: 0,
            uptime: 123,
        };
        let mut logs = VecDeque::new();
        logs.push_back(
            normalize_rest_log(&json!({
                "id": "n1",
                "timestamp": "2024-01-01T00:00:00Z",
                "log_type": "network",
                "severity": "low",
                "message": ""
            }))
            .unwrap(),
        );
        let derived = derive(&logs, 4, &prev);
        assert_eq!(derived.cpu, 33.0);
        assert_eq!(derived.disk, 55.0);
        assert_eq!(derived.network_connections, 4);
    }

    #[test]
    fn full_payload_extraction() {
        let mut logs = VecDeque::new();
        logs.push_back(metrics_entry(
            "1",
            "2024-01-01T00:00:00Z",
            json!({
                "cpu_percent": 12.5,
                "memory_percent": 48.2,
                "uptime_seconds": 86400,
                "disks": {"/dev/sda1": {"used_percent": 81.0}}
            }),
        ));
        let derived = derive(&logs, 5, &SystemMetrics::default());
        assert_eq!(derived.cpu, 12.5);
        assert_eq!(derived.memory, 48.2);
        assert_eq!(derived.uptime, 86400);
        assert_eq!(derived.disk, 81.0);
        assert_eq!(derived.network_connections, 5);
    }
}
