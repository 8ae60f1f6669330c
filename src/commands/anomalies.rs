use crate::engine::TelemetryEngine;
use crate::types::anomaly::{Anomaly, AnomalyStats, AnomalyStatus};
use crate::types::xai::XaiExplanation;

#[tauri::command]
pub fn anomalies_list(engine: tauri::State<'_, TelemetryEngine>) -> Vec<Anomaly> {
    engine.anomalies()
}

#[tauri::command]
pub fn anomalies_stats(engine: tauri::State<'_, TelemetryEngine>) -> AnomalyStats {
    engine.anomaly_stats()
}

/// Optimistic transition: the registry entry (if any) flips immediately,
/// the remote PATCH runs in the background and is never rolled back.
#[tauri::command]
pub fn anomalies_set_status(
    engine: tauri::State<'_, TelemetryEngine>,
    id: String,
    status: AnomalyStatus,
) {
    engine.set_anomaly_status(id, status);
}

/// `None` means the explanation is currently unavailable; the webview shows
/// a retryable placeholder.
#[tauri::command]
pub async fn anomalies_explain(
    engine: tauri::State<'_, TelemetryEngine>,
    id: String,
) -> Result<Option<XaiExplanation>, String> {
    Ok(engine.fetch_explanation(&id).await)
}
