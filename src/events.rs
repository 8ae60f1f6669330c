use serde::Serialize;
use tauri::{AppHandle, Emitter, Runtime};

/// Event names as constants — matches the webview's listener registry
pub mod event_names {
    pub const LOGS_UPDATED: &str = "logs:updated";
    pub const ANOMALIES_UPDATED: &str = "anomalies:updated";
    pub const TIMELINE_UPDATED: &str = "timeline:updated";
    pub const METRICS_UPDATED: &str = "metrics:updated";
    pub const STREAM_STATUS: &str = "stream:status";
}

pub fn emit_event<R: Runtime, T: Serialize + Clone>(
    app: &AppHandle<R>,
    event: &str,
    payload: T,
) -> Result<(), String> {
    app.emit(event, payload).map_err(|e| e.to_string())
}
