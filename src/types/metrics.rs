use serde::{Deserialize, Serialize};

/// Derived system-health projection. This has no identity of its own: it is
/// recomputed from the canonical log set and the active-host count, never
/// partially reset by incomplete payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub network_connections: u64,
    pub active_processes: u64,
    pub uptime: u64,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            cpu: 0.0,
            memory: 0.0,
            disk: 0.0,
            network_connections: 0,
            active_processes: 0,
            uptime: 0,
        }
    }
}
