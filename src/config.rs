use std::time::Duration;

use crate::state::LOG_BUFFER_CAP;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:8000/ws/alerts";
const DEFAULT_ENDPOINT_ID: &str = "default";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// Engine configuration, read once at startup from the environment
/// (`.env` is loaded in `run()` before this is constructed).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub stream_url: String,
    pub endpoint_id: String,
    pub poll_interval: Duration,
    pub log_buffer_cap: usize,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let poll_secs = std::env::var("CYBERWATCH_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        Self {
            api_base_url: std::env::var("CYBERWATCH_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            stream_url: std::env::var("CYBERWATCH_STREAM_URL")
                .unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string()),
            endpoint_id: std::env::var("CYBERWATCH_ENDPOINT_ID")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT_ID.to_string()),
            poll_interval: Duration::from_secs(poll_secs),
            log_buffer_cap: LOG_BUFFER_CAP,
        }
    }

    /// Full stream endpoint including the endpoint-id query parameter.
    pub fn stream_endpoint(&self) -> String {
        format!("{}?endpoint_id={}", self.stream_url, self.endpoint_id)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            endpoint_id: DEFAULT_ENDPOINT_ID.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            log_buffer_cap: LOG_BUFFER_CAP,
        }
    }
}
