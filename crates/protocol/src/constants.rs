use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Time to wait for a pong response (or any incoming message).
///
/// Acts as a read deadline: if *nothing* arrives within this window the
/// connection is considered dead. Set high enough to tolerate slow tier
/// I/O on the server side during large transfers.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often to send pings (must be well below [`WS_PONG_WAIT`]).
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum WebSocket message size in bytes (16 MB).
///
/// Bounds a single chunk frame; the configured chunk size plus the frame
/// header must stay below this.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default size of an emitted download chunk (64 KiB).
///
/// Balances framing overhead against per-call memory pressure; the last
/// chunk of a stream may be shorter.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Timeout for request/response operations on the client side.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Upload (client-streaming): binary chunk frames, then upload_end.
    #[serde(rename = "upload_end")]
    UploadEnd,
    #[serde(rename = "upload_cancel")]
    UploadCancel,
    #[serde(rename = "upload_ack")]
    UploadAck,
    #[serde(rename = "cancel_ack")]
    CancelAck,

    // Download (server-streaming): download, then chunk frames, then done.
    #[serde(rename = "download")]
    Download,
    #[serde(rename = "download_done")]
    DownloadDone,

    // Unary operations.
    #[serde(rename = "get_metadata")]
    GetMetadata,
    #[serde(rename = "metadata")]
    Metadata,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "delete_ack")]
    DeleteAck,

    // Keepalive and failure.
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

/// Error codes carried in error envelopes.
pub const ERR_CODE_BAD_REQUEST: i32 = 400;
pub const ERR_CODE_NOT_FOUND: i32 = 404;
pub const ERR_CODE_EMPTY_UPLOAD: i32 = 406;
pub const ERR_CODE_NAME_MISMATCH: i32 = 409;
pub const ERR_CODE_INTERNAL: i32 = 500;
pub const ERR_CODE_NOT_IMPLEMENTED: i32 = 501;
pub const ERR_CODE_INTERRUPTED: i32 = 502;
pub const ERR_CODE_PERSIST_FAILED: i32 = 507;
