//! WebSocket transport for the FileDepot server.
//!
//! Accepts any number of concurrent client connections, dispatches JSON
//! envelopes and binary chunk frames to a [`Handler`], and manages the
//! connection lifecycle (ping/pong keepalive, graceful shutdown). The
//! transport guarantees the in-order delivery the chunk protocol relies on:
//! frames are dispatched in arrival order, one at a time per connection.

mod connection;
mod handler;
mod server;

pub use connection::{Outbound, SendError, Sender};
pub use handler::{Handler, HandlerFuture};
pub use server::{DepotServer, ServerConfig};

/// Send buffer capacity per connection.
///
/// Download streams put one chunk frame per slot; streaming sends await
/// capacity, so this bounds per-connection memory rather than dropping
/// frames.
pub const SEND_BUFFER_SIZE: usize = 64;

/// Errors produced by the server transport.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
