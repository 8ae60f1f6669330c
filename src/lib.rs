pub mod api;
pub mod commands;
pub mod config;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod normalize;
pub mod poller;
pub mod state;
pub mod stream;
pub mod types;

use tauri::Manager;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for cyberwatch crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cyberwatch=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_tracing();

    // Load .env from the crate directory, falling back silently when absent
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let env_path = manifest_dir.join(".env");
    dotenvy::from_path(&env_path).ok();

    let engine = engine::TelemetryEngine::new(config::EngineConfig::from_env());

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .manage(engine)
        .setup(|app| {
            let engine = app.state::<engine::TelemetryEngine>();
            engine.start(app.handle().clone())?;
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::logs::logs_list,
            commands::logs::logs_clear,
            commands::anomalies::anomalies_list,
            commands::anomalies::anomalies_stats,
            commands::anomalies::anomalies_set_status,
            commands::anomalies::anomalies_explain,
            commands::timeline::timeline_list,
            commands::metrics::metrics_get,
            commands::stream::stream_toggle,
            commands::stream::stream_status,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let tauri::RunEvent::ExitRequested { .. } = event {
            app_handle.state::<engine::TelemetryEngine>().stop();
        }
    });
}
