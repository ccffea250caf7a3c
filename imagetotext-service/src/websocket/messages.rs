//! WebSocket message types.
//!
//! Defines the client-to-server and server-to-client message formats
//! for WebSocket communication.

use serde::{Deserialize, Serialize};

use crate::pipeline::JobSnapshot;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive ping
    Ping,
    /// Ask for the current job snapshot
    Subscribe,
    /// Start extraction of the staged image
    Extract,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The live job changed
    PipelineUpdate(JobSnapshot),
    /// Keepalive pong response
    Pong { timestamp: u64 },
    /// Error message
    Error {
        code: String,
        message: String,
        recoverable: bool,
    },
}

impl From<JobSnapshot> for ServerMessage {
    fn from(snapshot: JobSnapshot) -> Self {
        ServerMessage::PipelineUpdate(snapshot)
    }
}
