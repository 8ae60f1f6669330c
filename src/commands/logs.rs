use crate::engine::TelemetryEngine;
use crate::types::log::LogEntry;

#[tauri::command]
pub fn logs_list(engine: tauri::State<'_, TelemetryEngine>) -> Vec<LogEntry> {
    engine.logs()
}

#[tauri::command]
pub fn logs_clear(engine: tauri::State<'_, TelemetryEngine>) {
    engine.clear_logs();
}
