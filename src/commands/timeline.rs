use crate::engine::TelemetryEngine;
use crate::types::timeline::TimelineEvent;

#[tauri::command]
pub fn timeline_list(engine: tauri::State<'_, TelemetryEngine>) -> Vec<TimelineEvent> {
    engine.timeline()
}
