//! Canonical collections owned by the reconciliation engine.
//!
//! All mutation goes through the engine's single worker; nothing here
//! blocks, performs I/O, or touches anything beyond its own fields.

use std::collections::{HashSet, VecDeque};

use crate::metrics;
use crate::types::anomaly::{Anomaly, AnomalyStats, AnomalyStatus};
use crate::types::log::LogEntry;
use crate::types::metrics::SystemMetrics;
use crate::types::timeline::TimelineEvent;

/// Live log buffer capacity. Insertion beyond this evicts the oldest entry.
pub const LOG_BUFFER_CAP: usize = 200;

pub struct TelemetryState {
    /// Most-recent-first, bounded by `log_cap`.
    logs: VecDeque<LogEntry>,
    anomalies: Vec<Anomaly>,
    timeline: Vec<TimelineEvent>,
    metrics: SystemMetrics,
    /// Distinct source IPs seen in network logs this session. Grows
    /// monotonically; cleared only when the session is torn down.
    active_hosts: HashSet<String>,
    log_cap: usize,
}

impl TelemetryState {
    pub fn new(log_cap: usize) -> Self {
        Self {
            logs: VecDeque::with_capacity(log_cap),
            anomalies: Vec::new(),
            timeline: Vec::new(),
            metrics: SystemMetrics::default(),
            active_hosts: HashSet::new(),
            log_cap,
        }
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.iter().cloned().collect()
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies.clone()
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        self.timeline.clone()
    }

    pub fn metrics(&self) -> SystemMetrics {
        self.metrics.clone()
    }

    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub fn host_count(&self) -> usize {
        self.active_hosts.len()
    }

    /// Snapshot refresh: the whole buffer is replaced, newest first,
    /// truncated to capacity.
    pub fn replace_logs(&mut self, entries: Vec<LogEntry>) {
        self.logs = entries.into_iter().take(self.log_cap).collect();
        self.recompute_metrics();
    }

    /// Stream path: prepend one entry, evicting the oldest beyond capacity.
    /// An entry whose id is already buffered replaces the older occurrence,
    /// keeping ids unique within the buffer.
    pub fn prepend_log(&mut self, entry: LogEntry) {
        self.logs.retain(|existing| existing.id != entry.id);
        self.logs.push_front(entry);
        self.logs.truncate(self.log_cap);
        self.recompute_metrics();
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
        self.recompute_metrics();
    }

    pub fn replace_anomalies(&mut self, anomalies: Vec<Anomaly>) {
        self.anomalies = anomalies;
    }

    pub fn replace_timeline(&mut self, events: Vec<TimelineEvent>) {
        self.timeline = events;
    }

    /// Optimistic status update. Returns false (and changes nothing) when
    /// the id is not in the registry.
    pub fn set_anomaly_status(&mut self, id: &str, status: AnomalyStatus) -> bool {
        match self.anomalies.iter_mut().find(|a| a.id == id) {
            Some(anomaly) => {
                anomaly.status = status;
                true
            }
            None => false,
        }
    }

    /// Record a source IP from a network frame. Returns true when the host
    /// was not seen before this session.
    pub fn record_host(&mut self, ip: &str) -> bool {
        let added = self.active_hosts.insert(ip.to_string());
        if added {
            self.metrics.network_connections = self.active_hosts.len() as u64;
        }
        added
    }

    pub fn anomaly_stats(&self) -> AnomalyStats {
        let count = |status: AnomalyStatus| {
            self.anomalies.iter().filter(|a| a.status == status).count()
        };
        let avg_risk = if self.anomalies.is_empty() {
            0
        } else {
            let total: u32 = self.anomalies.iter().map(|a| u32::from(a.risk_score)).sum();
            (total as f64 / self.anomalies.len() as f64).round() as u8
        };
        AnomalyStats {
            active: count(AnomalyStatus::Active),
            investigating: count(AnomalyStatus::Investigating),
            resolved: count(AnomalyStatus::Resolved),
            dismissed: count(AnomalyStatus::Dismissed),
            avg_risk,
        }
    }

    fn recompute_metrics(&mut self) {
        self.metrics =
            metrics::derive(&self.logs, self.active_hosts.len() as u64, &self.metrics);
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new(LOG_BUFFER_CAP)
    }
}
