//! Listener for the telemetry service's WebSocket alert stream.
//!
//! One logical connection; frames are parsed here and forwarded to the
//! engine worker, which applies them strictly in arrival order. A frame
//! that is not valid JSON is logged and discarded without disturbing the
//! connection. There is no automatic reconnect: an unplanned disconnect is
//! surfaced through a stream-status event and the user re-opens the stream
//! by toggling it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::engine::EngineEvent;

pub async fn listen(
    endpoint: String,
    tx: UnboundedSender<EngineEvent>,
    active: Arc<AtomicBool>,
) {
    let (mut ws, _) = match connect_async(endpoint.as_str()).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "Alert stream connection failed");
            let _ = tx.send(EngineEvent::StreamStatus {
                connected: false,
                detail: Some(e.to_string()),
            });
            return;
        }
    };

    info!(endpoint = %endpoint, "Alert stream connected");
    let _ = tx.send(EngineEvent::StreamStatus {
        connected: true,
        detail: None,
    });

    let mut close_detail = None;
    while let Some(message) = ws.next().await {
        if !active.load(Ordering::SeqCst) {
            break;
        }
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(frame) => {
                    if tx.send(EngineEvent::StreamFrame(frame)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Discarding unparsable stream frame");
                }
            },
            Ok(Message::Close(frame)) => {
                close_detail = frame.map(|f| f.reason.to_string());
                break;
            }
            Ok(_) => {
                // Ping/pong and binary frames carry no telemetry.
            }
            Err(e) => {
                close_detail = Some(e.to_string());
                break;
            }
        }
    }

    debug!("Alert stream listener exiting");
    let _ = tx.send(EngineEvent::StreamStatus {
        connected: false,
        detail: close_detail,
    });
}
