use crate::engine::TelemetryEngine;
use crate::types::metrics::SystemMetrics;

#[tauri::command]
pub fn metrics_get(engine: tauri::State<'_, TelemetryEngine>) -> SystemMetrics {
    engine.metrics()
}
