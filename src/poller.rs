//! Periodic snapshot refresh, one loop per entity kind.
//!
//! Each tick issues exactly one request and awaits it before sleeping
//! again, so at most one request per kind is ever in flight. A failed tick
//! keeps the previous working set and is retried at the next interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::engine::EngineEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Logs,
    Anomalies,
    Timeline,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 3] = [
        SnapshotKind::Logs,
        SnapshotKind::Anomalies,
        SnapshotKind::Timeline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SnapshotKind::Logs => "logs",
            SnapshotKind::Anomalies => "anomalies",
            SnapshotKind::Timeline => "timeline",
        }
    }
}

pub async fn poll_loop(
    kind: SnapshotKind,
    api: ApiClient,
    tx: UnboundedSender<EngineEvent>,
    active: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !active.load(Ordering::SeqCst) {
            break;
        }

        let result = match kind {
            SnapshotKind::Logs => api.logs_explorer().await,
            SnapshotKind::Anomalies => api.anomalies().await,
            SnapshotKind::Timeline => api.timeline().await,
        };

        match result {
            Ok(rows) => {
                let event = match kind {
                    SnapshotKind::Logs => EngineEvent::LogsSnapshot(rows),
                    SnapshotKind::Anomalies => EngineEvent::AnomaliesSnapshot(rows),
                    SnapshotKind::Timeline => EngineEvent::TimelineSnapshot(rows),
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(kind = kind.name(), error = %e, "Snapshot poll failed; keeping previous data");
            }
        }
    }
    debug!(kind = kind.name(), "Poll loop stopped");
}
