use crate::engine::TelemetryEngine;

/// Returns the new setting: true when the live stream is now on.
#[tauri::command]
pub fn stream_toggle(engine: tauri::State<'_, TelemetryEngine>) -> bool {
    engine.toggle_stream()
}

#[tauri::command]
pub fn stream_status(engine: tauri::State<'_, TelemetryEngine>) -> bool {
    engine.stream_enabled()
}
