//! WebSocket support for live pipeline updates
//!
//! Every connection receives the current job snapshot on connect and a
//! `pipeline_update` message on each change to the live job. Clients can also
//! trigger extraction of a staged image.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::service::ImageToTextService;

pub mod messages;

pub use messages::{ClientMessage, ServerMessage};

/// Handle a WebSocket connection
///
/// Runs until the client disconnects. Outgoing messages from the update
/// forwarder and from request handling share one channel so writes to the
/// socket are never interleaved.
pub async fn handle_ws_connection(socket: WebSocket, service: Arc<ImageToTextService>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Forward queued messages to the socket
    let session_id_clone = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to serialize WebSocket message");
                }
            }
        }
        debug!(session_id = %session_id_clone, "WebSocket send task ended");
    });

    // Push a snapshot for every change to the live job (the first item is the current job)
    let update_tx = msg_tx.clone();
    let update_service = service.clone();
    let update_task = tokio::spawn(async move {
        let mut updates = WatchStream::new(update_service.subscribe());
        while let Some(job) = updates.next().await {
            let snapshot = update_service.snapshot_of(&job);
            if update_tx.send(snapshot.into()).is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_client_message(&session_id, &text, &msg_tx, &service);
            }
            Ok(Message::Binary(data)) => {
                if let Ok(text) = String::from_utf8(data.to_vec()) {
                    handle_client_message(&session_id, &text, &msg_tx, &service);
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "WebSocket connection closed by client");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    update_task.abort();
    send_task.abort();
    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Handle a client message
fn handle_client_message(
    session_id: &str,
    text: &str,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    service: &ImageToTextService,
) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(
                session_id = %session_id,
                error = %e,
                text = %text,
                "Failed to parse client message"
            );
            let _ = tx.send(ServerMessage::Error {
                code: "parse_error".to_string(),
                message: format!("Failed to parse message: {}", e),
                recoverable: true,
            });
            return;
        }
    };

    let reply = match msg {
        ClientMessage::Ping => {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            Some(ServerMessage::Pong { timestamp })
        }
        ClientMessage::Subscribe => Some(service.snapshot().into()),
        ClientMessage::Extract => {
            // Progress arrives through the update forwarder
            let snapshot = service.extract_staged();
            debug!(session_id = %session_id, job_id = %snapshot.job_id, "Extraction requested over WebSocket");
            None
        }
    };

    if let Some(reply) = reply
        && tx.send(reply).is_err()
    {
        warn!(session_id = %session_id, "Failed to queue WebSocket reply");
    }
}
