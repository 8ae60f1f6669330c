//! Reconciliation engine: owns the canonical collections and funnels every
//! mutation (poll results, stream frames, user commands) through one
//! sequential worker, so no two sources ever touch shared state
//! concurrently. Readers get locked clones; writers send [`EngineEvent`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tauri::{AppHandle, Runtime};
use tauri_plugin_notification::NotificationExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::EngineConfig;
use crate::events::{emit_event, event_names};
use crate::normalize;
use crate::poller::{self, SnapshotKind};
use crate::state::TelemetryState;
use crate::stream;
use crate::types::anomaly::{Anomaly, AnomalyStats, AnomalyStatus};
use crate::types::log::LogEntry;
use crate::types::metrics::SystemMetrics;
use crate::types::timeline::TimelineEvent;
use crate::types::xai::XaiExplanation;

/// Risk score at which a freshly-surfaced anomaly warrants a native
/// notification (the service marks >= 90 as critical).
const CRITICAL_RISK: u8 = 90;

/// Everything that can mutate the canonical state. Produced by the poller,
/// the stream listener, refresh completions, and user commands; consumed by
/// the single worker.
#[derive(Debug)]
pub enum EngineEvent {
    LogsSnapshot(Vec<Value>),
    AnomaliesSnapshot(Vec<Value>),
    TimelineSnapshot(Vec<Value>),
    StreamFrame(Value),
    StreamStatus {
        connected: bool,
        detail: Option<String>,
    },
    /// Optimistic, no-rollback: the local registry is updated here; the
    /// remote PATCH runs independently and only logs on failure.
    SetAnomalyStatus {
        id: String,
        status: AnomalyStatus,
    },
    ClearLogs,
}

/// Side effects the worker must carry out after a state mutation.
#[derive(Debug, PartialEq)]
pub enum Effect {
    LogsChanged,
    AnomaliesChanged,
    TimelineChanged,
    MetricsChanged,
    /// The stream hinted that something changed; refetch anomaly and
    /// timeline snapshots out of band.
    RefreshSnapshots,
    StreamStatusChanged {
        connected: bool,
        detail: Option<String>,
    },
    NotifyCritical(Vec<Anomaly>),
}

/// Applies one event to the state and reports what must happen next.
/// Pure apart from tracing: no I/O, no spawning, no emission.
pub fn reconcile(state: &mut TelemetryState, event: EngineEvent) -> Vec<Effect> {
    match event {
        EngineEvent::LogsSnapshot(rows) => {
            let total = rows.len();
            let entries: Vec<LogEntry> = rows
                .iter()
                .filter_map(normalize::normalize_rest_log)
                .collect();
            let dropped = total - entries.len();
            if dropped > 0 {
                debug!(dropped, "Dropped malformed log rows from snapshot");
            }
            state.replace_logs(entries);
            vec![Effect::LogsChanged, Effect::MetricsChanged]
        }
        EngineEvent::AnomaliesSnapshot(rows) => {
            let known: std::collections::HashSet<String> =
                state.anomalies().into_iter().map(|a| a.id).collect();
            let anomalies: Vec<Anomaly> =
                rows.iter().map(normalize::normalize_anomaly).collect();
            let fresh_critical: Vec<Anomaly> = anomalies
                .iter()
                .filter(|a| a.risk_score >= CRITICAL_RISK && !known.contains(&a.id))
                .cloned()
                .collect();
            state.replace_anomalies(anomalies);
            let mut effects = vec![Effect::AnomaliesChanged];
            if !fresh_critical.is_empty() {
                effects.push(Effect::NotifyCritical(fresh_critical));
            }
            effects
        }
        EngineEvent::TimelineSnapshot(rows) => {
            let events: Vec<TimelineEvent> = rows
                .iter()
                .filter_map(normalize::normalize_timeline_event)
                .collect();
            state.replace_timeline(events);
            vec![Effect::TimelineChanged]
        }
        EngineEvent::StreamFrame(frame) => {
            let mut effects = Vec::new();
            let log_type = frame.get("log_type").and_then(Value::as_str);

            if log_type == Some("network") {
                let src_ip = normalize::parse_raw_data(frame.get("raw_data"))
                    .and_then(|data| {
                        data.get("src_ip").and_then(Value::as_str).map(str::to_string)
                    });
                if let Some(ip) = src_ip {
                    if state.record_host(&ip) {
                        effects.push(Effect::MetricsChanged);
                    }
                }
            }

            if log_type.is_some() {
                match normalize::normalize_stream_log(&frame, Utc::now()) {
                    Some(entry) => {
                        state.prepend_log(entry);
                        effects.push(Effect::LogsChanged);
                        effects.push(Effect::MetricsChanged);
                    }
                    None => {
                        warn!("Discarding stream frame with unparsable timestamp");
                    }
                }
            }

            // Every frame is a hint that the registry and timeline moved.
            effects.push(Effect::RefreshSnapshots);
            effects
        }
        EngineEvent::StreamStatus { connected, detail } => {
            vec![Effect::StreamStatusChanged { connected, detail }]
        }
        EngineEvent::SetAnomalyStatus { id, status } => {
            if state.set_anomaly_status(&id, status) {
                vec![Effect::AnomaliesChanged]
            } else {
                debug!(id = %id, "Status change for unknown anomaly ignored locally");
                Vec::new()
            }
        }
        EngineEvent::ClearLogs => {
            state.clear_logs();
            vec![Effect::LogsChanged, Effect::MetricsChanged]
        }
    }
}

pub struct TelemetryEngine {
    config: EngineConfig,
    api: ApiClient,
    state: Arc<Mutex<TelemetryState>>,
    /// Session guard: completions arriving after stop() are discarded.
    active: Arc<AtomicBool>,
    stream_enabled: AtomicBool,
    tx: Mutex<Option<UnboundedSender<EngineEvent>>>,
    stream_task: Mutex<Option<tauri::async_runtime::JoinHandle<()>>>,
    poll_tasks: Mutex<Vec<tauri::async_runtime::JoinHandle<()>>>,
}

impl TelemetryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let api = ApiClient::new(&config.api_base_url);
        let state = Arc::new(Mutex::new(TelemetryState::new(config.log_buffer_cap)));
        Self {
            config,
            api,
            state,
            active: Arc::new(AtomicBool::new(false)),
            stream_enabled: AtomicBool::new(true),
            tx: Mutex::new(None),
            stream_task: Mutex::new(None),
            poll_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start the session: fresh state, worker loop, one poll loop per
    /// snapshot kind, and the stream listener when live mode is on.
    pub fn start<R: Runtime>(&self, app: AppHandle<R>) -> Result<(), String> {
        let mut tx_guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if tx_guard.is_some() {
            return Err("Engine already running".to_string());
        }

        *self.state.lock().unwrap_or_else(|e| e.into_inner()) =
            TelemetryState::new(self.config.log_buffer_cap);
        self.active.store(true, Ordering::SeqCst);

        let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
        *tx_guard = Some(tx.clone());
        drop(tx_guard);

        // Worker: the only task that mutates state.
        {
            let state = Arc::clone(&self.state);
            let active = Arc::clone(&self.active);
            let api = self.api.clone();
            let worker_tx = tx.clone();
            let app = app.clone();
            tauri::async_runtime::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if !active.load(Ordering::SeqCst) {
                        continue;
                    }
                    let effects = {
                        let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
                        reconcile(&mut guard, event)
                    };
                    for effect in effects {
                        carry_out(&app, &state, &api, &worker_tx, &active, effect);
                    }
                }
                debug!("Engine worker stopped");
            });
        }

        let mut poll_tasks = self.poll_tasks.lock().unwrap_or_else(|e| e.into_inner());
        for kind in SnapshotKind::ALL {
            let api = self.api.clone();
            let tx = tx.clone();
            let active = Arc::clone(&self.active);
            let interval = self.config.poll_interval;
            poll_tasks.push(tauri::async_runtime::spawn(async move {
                poller::poll_loop(kind, api, tx, active, interval).await;
            }));
        }
        drop(poll_tasks);

        if self.stream_enabled.load(Ordering::SeqCst) {
            self.spawn_stream(tx);
        }

        info!("Telemetry session started");
        Ok(())
    }

    /// End the session: discard late completions, cancel every loop, close
    /// the stream. Safe to call when already stopped.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(task) = self
            .stream_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        for task in self
            .poll_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            task.abort();
        }
        // Dropping the sender lets the worker drain and exit.
        *self.tx.lock().unwrap_or_else(|e| e.into_inner()) = None;
        info!("Telemetry session stopped");
    }

    fn spawn_stream(&self, tx: UnboundedSender<EngineEvent>) {
        let endpoint = self.config.stream_endpoint();
        let active = Arc::clone(&self.active);
        let task = tauri::async_runtime::spawn(async move {
            stream::listen(endpoint, tx, active).await;
        });
        *self.stream_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    /// Flip live streaming. Off closes the connection without retry; on
    /// opens a fresh one. Returns the new setting.
    pub fn toggle_stream(&self) -> bool {
        let now_enabled = !self.stream_enabled.fetch_xor(true, Ordering::SeqCst);
        if now_enabled {
            let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner()).clone();
            if let Some(tx) = tx {
                self.spawn_stream(tx);
            }
        } else if let Some(task) = self
            .stream_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        info!(enabled = now_enabled, "Live stream toggled");
        now_enabled
    }

    pub fn stream_enabled(&self) -> bool {
        self.stream_enabled.load(Ordering::SeqCst)
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).logs()
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .anomalies()
    }

    pub fn anomaly_stats(&self) -> AnomalyStats {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .anomaly_stats()
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .timeline()
    }

    pub fn metrics(&self) -> SystemMetrics {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .metrics()
    }

    pub fn clear_logs(&self) {
        self.send(EngineEvent::ClearLogs);
    }

    /// Optimistic status transition: the local registry updates through the
    /// worker, the remote PATCH is fired independently, and a remote
    /// failure is logged without reverting anything.
    pub fn set_anomaly_status(&self, id: String, status: AnomalyStatus) {
        self.send(EngineEvent::SetAnomalyStatus {
            id: id.clone(),
            status,
        });
        let api = self.api.clone();
        tauri::async_runtime::spawn(async move {
            if let Err(e) = api.patch_anomaly_status(&id, status).await {
                warn!(id = %id, error = %e, "Remote status update failed; local state kept");
            }
        });
    }

    /// On-demand XAI fetch. `None` means "explanation unavailable"; the
    /// caller may retry.
    pub async fn fetch_explanation(&self, id: &str) -> Option<XaiExplanation> {
        match self.api.anomaly_xai(id).await {
            Ok(explanation) => Some(explanation),
            Err(e) => {
                warn!(id = %id, error = %e, "Explanation fetch failed");
                None
            }
        }
    }

    fn send(&self, event: EngineEvent) {
        if let Some(tx) = &*self.tx.lock().unwrap_or_else(|e| e.into_inner()) {
            let _ = tx.send(event);
        }
    }
}

/// Execute one effect on behalf of the worker.
fn carry_out<R: Runtime>(
    app: &AppHandle<R>,
    state: &Arc<Mutex<TelemetryState>>,
    api: &ApiClient,
    tx: &UnboundedSender<EngineEvent>,
    active: &Arc<AtomicBool>,
    effect: Effect,
) {
    let snapshot = |f: fn(&TelemetryState) -> Value| {
        let guard = state.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    };
    let result = match effect {
        Effect::LogsChanged => emit_event(
            app,
            event_names::LOGS_UPDATED,
            snapshot(|s| serde_json::json!(s.logs())),
        ),
        Effect::AnomaliesChanged => emit_event(
            app,
            event_names::ANOMALIES_UPDATED,
            snapshot(|s| serde_json::json!(s.anomalies())),
        ),
        Effect::TimelineChanged => emit_event(
            app,
            event_names::TIMELINE_UPDATED,
            snapshot(|s| serde_json::json!(s.timeline())),
        ),
        Effect::MetricsChanged => emit_event(
            app,
            event_names::METRICS_UPDATED,
            snapshot(|s| serde_json::json!(s.metrics())),
        ),
        Effect::StreamStatusChanged { connected, detail } => emit_event(
            app,
            event_names::STREAM_STATUS,
            serde_json::json!({"connected": connected, "detail": detail}),
        ),
        Effect::RefreshSnapshots => {
            let api = api.clone();
            let tx = tx.clone();
            let active = Arc::clone(active);
            tauri::async_runtime::spawn(async move {
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                match api.anomalies().await {
                    Ok(rows) => {
                        let _ = tx.send(EngineEvent::AnomaliesSnapshot(rows));
                    }
                    Err(e) => warn!(error = %e, "Out-of-band anomaly refresh failed"),
                }
                match api.timeline().await {
                    Ok(rows) => {
                        let _ = tx.send(EngineEvent::TimelineSnapshot(rows));
                    }
                    Err(e) => warn!(error = %e, "Out-of-band timeline refresh failed"),
                }
            });
            Ok(())
        }
        Effect::NotifyCritical(anomalies) => {
            for anomaly in anomalies {
                if let Err(e) = app
                    .notification()
                    .builder()
                    .title("Critical anomaly detected")
                    .body(format!("{} (risk {})", anomaly.title, anomaly.risk_score))
                    .show()
                {
                    warn!(error = %e, "Failed to show anomaly notification");
                }
            }
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "Failed to emit engine event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> TelemetryState {
        TelemetryState::default()
    }

    #[test]
    fn logs_snapshot_replaces_buffer_and_drops_bad_rows() {
        let mut st = state();
        let effects = reconcile(
            &mut st,
            EngineEvent::LogsSnapshot(vec![
                json!({"id": "1", "timestamp": "2024-01-01T00:00:00Z", "log_type": "system", "severity": "critical", "message": "CPU 92%"}),
                json!({"id": "2", "timestamp": "bogus", "severity": "low", "message": ""}),
            ]),
        );
        assert_eq!(st.log_count(), 1);
        assert!(effects.contains(&Effect::LogsChanged));
        assert!(effects.contains(&Effect::MetricsChanged));
    }

    #[test]
    fn disjoint_anomaly_snapshots_leave_no_survivors() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::AnomaliesSnapshot(vec![json!({"id": "a1"}), json!({"id": "a2"})]),
        );
        reconcile(
            &mut st,
            EngineEvent::AnomaliesSnapshot(vec![json!({"id": "b1"})]),
        );
        let ids: Vec<_> = st.anomalies().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["b1"]);
    }

    #[test]
    fn new_critical_anomaly_triggers_notification_effect() {
        let mut st = state();
        let effects = reconcile(
            &mut st,
            EngineEvent::AnomaliesSnapshot(vec![
                json!({"id": "a1", "risk_score": 95}),
                json!({"id": "a2", "risk_score": 50}),
            ]),
        );
        let critical = effects.iter().find_map(|e| match e {
            Effect::NotifyCritical(list) => Some(list),
            _ => None,
        });
        assert_eq!(critical.unwrap().len(), 1);

        // The same anomaly does not notify twice
        let effects = reconcile(
            &mut st,
            EngineEvent::AnomaliesSnapshot(vec![json!({"id": "a1", "risk_score": 95})]),
        );
        assert!(effects
            .iter()
            .all(|e| !matches!(e, Effect::NotifyCritical(_))));
    }

    #[test]
    fn stream_frame_prepends_log_and_requests_refresh() {
        let mut st = state();
        let effects = reconcile(
            &mut st,
            EngineEvent::StreamFrame(json!({
                "id": "s1",
                "log_type": "auth",
                "severity": "high",
                "message": "failed login from 10.1.2.3"
            })),
        );
        assert_eq!(st.log_count(), 1);
        assert_eq!(st.logs()[0].id, "s1");
        assert!(effects.contains(&Effect::RefreshSnapshots));
    }

    #[test]
    fn non_log_frame_still_requests_refresh() {
        let mut st = state();
        let effects = reconcile(&mut st, EngineEvent::StreamFrame(json!({"kind": "hint"})));
        assert_eq!(st.log_count(), 0);
        assert_eq!(effects, vec![Effect::RefreshSnapshots]);
    }

    #[test]
    fn network_frame_accumulates_hosts_monotonically() {
        let mut st = state();
        for ip in ["1.1.1.1", "2.2.2.2", "1.1.1.1"] {
            reconcile(
                &mut st,
                EngineEvent::StreamFrame(json!({
                    "log_type": "network",
                    "message": "conn",
                    "raw_data": {"src_ip": ip}
                })),
            );
        }
        assert_eq!(st.metrics().network_connections, 2);
    }

    #[test]
    fn network_frame_with_string_raw_data_still_counts_host() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::StreamFrame(json!({
                "log_type": "network",
                "message": "conn",
                "raw_data": "{\"src_ip\": \"9.9.9.9\"}"
            })),
        );
        assert_eq!(st.metrics().network_connections, 1);
    }

    #[test]
    fn metrics_frame_updates_projection_through_derivation() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::StreamFrame(json!({
                "id": "m1",
                "log_type": "system_metrics",
                "timestamp": "2024-01-01T00:00:00Z",
                "severity": "low",
                "message": "System metrics snapshot",
                "raw_data": {
                    "cpu_percent": 55.0,
                    "memory_percent": 70.0,
                    "uptime_seconds": 360,
                    "disks": {"a": {"used_percent": 40.0}, "b": {"used_percent": 60.0}}
                }
            })),
        );
        let metrics = st.metrics();
        assert_eq!(metrics.cpu, 55.0);
        assert_eq!(metrics.memory, 70.0);
        assert_eq!(metrics.disk, 50.0);
        assert_eq!(metrics.uptime, 360);
    }

    #[test]
    fn partial_metrics_frame_keeps_previous_values() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::StreamFrame(json!({
                "id": "m1",
                "log_type": "system_metrics",
                "timestamp": "2024-01-01T00:00:00Z",
                "message": "",
                "raw_data": {"cpu_percent": 55.0, "memory_percent": 70.0, "uptime_seconds": 100}
            })),
        );
        reconcile(
            &mut st,
            EngineEvent::StreamFrame(json!({
                "id": "m2",
                "log_type": "system_metrics",
                "timestamp": "2024-01-01T00:01:00Z",
                "message": "",
                "raw_data": {"memory_percent": 75.0}
            })),
        );
        let metrics = st.metrics();
        // cpu carried forward from the previous projection
        assert_eq!(metrics.cpu, 55.0);
        assert_eq!(metrics.memory, 75.0);
        assert_eq!(metrics.uptime, 100);
    }

    #[test]
    fn set_status_for_unknown_id_produces_no_effects() {
        let mut st = state();
        let effects = reconcile(
            &mut st,
            EngineEvent::SetAnomalyStatus {
                id: "ghost".to_string(),
                status: AnomalyStatus::Resolved,
            },
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn set_status_for_known_id_updates_registry() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::AnomaliesSnapshot(vec![json!({"id": "a1"})]),
        );
        let effects = reconcile(
            &mut st,
            EngineEvent::SetAnomalyStatus {
                id: "a1".to_string(),
                status: AnomalyStatus::Investigating,
            },
        );
        assert_eq!(effects, vec![Effect::AnomaliesChanged]);
        assert_eq!(st.anomalies()[0].status, AnomalyStatus::Investigating);
    }

    #[test]
    fn clear_logs_event_empties_buffer() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::StreamFrame(json!({"id": "x", "log_type": "system", "message": ""})),
        );
        assert_eq!(st.log_count(), 1);
        let effects = reconcile(&mut st, EngineEvent::ClearLogs);
        assert_eq!(st.log_count(), 0);
        assert!(effects.contains(&Effect::LogsChanged));
    }

    #[test]
    fn timeline_snapshot_replaces_wholesale() {
        let mut st = state();
        reconcile(
            &mut st,
            EngineEvent::TimelineSnapshot(vec![
                json!({"id": "t1", "timestamp": "2024-01-01T00:00:00Z"}),
            ]),
        );
        reconcile(
            &mut st,
            EngineEvent::TimelineSnapshot(vec![
                json!({"id": "t2", "timestamp": "2024-01-02T00:00:00Z"}),
            ]),
        );
        let ids: Vec<_> = st.timeline().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["t2"]);
    }

    #[test]
    fn stream_status_passes_through() {
        let mut st = state();
        let effects = reconcile(
            &mut st,
            EngineEvent::StreamStatus {
                connected: false,
                detail: Some("connection reset".to_string()),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::StreamStatusChanged {
                connected: false,
                detail: Some("connection reset".to_string())
            }]
        );
    }
}
