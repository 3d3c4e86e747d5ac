//! WebSocket client for one FileDepot call.
//!
//! The CLI opens a fresh connection per invocation and drives exactly one
//! call on it, so request/response correlation is just matching the call
//! id.

use std::path::Path;

use futures_util::{SinkExt, StreamExt};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use filedepot_protocol::constants::WS_REQUEST_TIMEOUT;
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::{ChunkHeader, encode_chunk_frame, parse_chunk_frame};
use filedepot_protocol::messages::{
    DeleteAck, DeleteRequest, DownloadDone, DownloadRequest, MetadataRequest, UploadAck,
};
use filedepot_protocol::types::ObjectInfo;
use filedepot_protocol::MessageType;

/// Errors from the depot client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] filedepot_protocol::FrameError),

    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("downloaded chunk failed checksum verification")]
    ChecksumMismatch,
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Client driving one call over one WebSocket connection.
pub struct DepotClient {
    ws: WsStream,
}

impl DepotClient {
    /// Connects to a depot server at `addr` (e.g. `ws://127.0.0.1:5000`).
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(addr).await?;
        Ok(Self { ws })
    }

    async fn send_msg(&mut self, msg: &Message) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg)?;
        self.ws.send(WsMessage::Text(json.into())).await?;
        Ok(())
    }

    /// Waits for the next text envelope matching `id`, answering transport
    /// pings along the way.
    async fn recv_reply(&mut self, id: &str) -> Result<Message, ClientError> {
        loop {
            let frame = tokio::time::timeout(WS_REQUEST_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| ClientError::Timeout)?
                .ok_or(ClientError::Closed)??;

            match frame {
                WsMessage::Text(text) => {
                    let msg: Message = serde_json::from_str(&text)?;
                    if msg.id == id {
                        return Ok(check_error(msg)?);
                    }
                    tracing::debug!(id = %msg.id, "skipping reply for another call");
                }
                WsMessage::Ping(data) => {
                    self.ws.send(WsMessage::Pong(data)).await?;
                }
                WsMessage::Close(_) => return Err(ClientError::Closed),
                _ => {}
            }
        }
    }

    /// Uploads `file` under `name`, streaming it in `chunk_size` chunks.
    pub async fn upload(
        &mut self,
        file: &Path,
        name: &str,
        chunk_size: usize,
    ) -> Result<UploadAck, ClientError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let mut reader = tokio::fs::File::open(file).await?;
        let mut buf = vec![0u8; chunk_size];
        let mut sent_any = false;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                if !sent_any {
                    // A zero-byte file is one empty chunk, not an empty
                    // stream.
                    self.send_chunk(&call_id, name, &[]).await?;
                }
                break;
            }
            self.send_chunk(&call_id, name, &buf[..n]).await?;
            sent_any = true;
        }

        let end = Message::new::<()>(call_id.as_str(), MessageType::UploadEnd, None)?;
        self.send_msg(&end).await?;

        let reply = self.recv_reply(&call_id).await?;
        expect_payload(reply, MessageType::UploadAck)
    }

    /// Uploads an in-memory chunk sequence (used by `demo`).
    pub async fn upload_chunks(
        &mut self,
        name: &str,
        chunks: &[&[u8]],
    ) -> Result<UploadAck, ClientError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        for payload in chunks {
            self.send_chunk(&call_id, name, payload).await?;
        }
        let end = Message::new::<()>(call_id.as_str(), MessageType::UploadEnd, None)?;
        self.send_msg(&end).await?;

        let reply = self.recv_reply(&call_id).await?;
        expect_payload(reply, MessageType::UploadAck)
    }

    async fn send_chunk(
        &mut self,
        call_id: &str,
        name: &str,
        payload: &[u8],
    ) -> Result<(), ClientError> {
        let header = ChunkHeader {
            id: call_id.to_string(),
            name: name.to_string(),
            checksum: checksum(payload),
        };
        let frame = encode_chunk_frame(&header, payload)?;
        self.ws.send(WsMessage::Binary(frame.into())).await?;
        Ok(())
    }

    /// Downloads `name` into `output`, returning the completion summary.
    pub async fn download(
        &mut self,
        name: &str,
        output: &Path,
    ) -> Result<DownloadDone, ClientError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let req = DownloadRequest { name: name.into() };
        let msg = Message::new(call_id.as_str(), MessageType::Download, Some(&req))?;
        self.send_msg(&msg).await?;

        let mut file = tokio::fs::File::create(output).await?;
        let mut written = 0u64;

        loop {
            let frame = tokio::time::timeout(WS_REQUEST_TIMEOUT, self.ws.next())
                .await
                .map_err(|_| ClientError::Timeout)?
                .ok_or(ClientError::Closed)??;

            match frame {
                WsMessage::Binary(data) => {
                    let (header, payload) = parse_chunk_frame(&data)?;
                    if header.id != call_id {
                        continue;
                    }
                    if !header.checksum.is_empty() && checksum(&payload) != header.checksum {
                        return Err(ClientError::ChecksumMismatch);
                    }
                    file.write_all(&payload).await?;
                    written += payload.len() as u64;
                }
                WsMessage::Text(text) => {
                    let msg: Message = serde_json::from_str(&text)?;
                    if msg.id != call_id {
                        continue;
                    }
                    // A failure mid-stream invalidates everything received
                    // so far; the partial file is the caller's to discard.
                    let msg = check_error(msg)?;
                    file.flush().await?;
                    let done: DownloadDone = expect_payload(msg, MessageType::DownloadDone)?;
                    if done.size != written {
                        return Err(ClientError::UnexpectedReply(format!(
                            "server reported {} bytes, received {written}",
                            done.size
                        )));
                    }
                    return Ok(done);
                }
                WsMessage::Ping(data) => {
                    self.ws.send(WsMessage::Pong(data)).await?;
                }
                WsMessage::Close(_) => return Err(ClientError::Closed),
                _ => {}
            }
        }
    }

    /// Fetches metadata for `name`.
    pub async fn stat(&mut self, name: &str) -> Result<ObjectInfo, ClientError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let req = MetadataRequest { name: name.into() };
        let msg = Message::new(call_id.as_str(), MessageType::GetMetadata, Some(&req))?;
        self.send_msg(&msg).await?;

        let reply = self.recv_reply(&call_id).await?;
        expect_payload(reply, MessageType::Metadata)
    }

    /// Deletes `name`.
    pub async fn delete(&mut self, name: &str) -> Result<DeleteAck, ClientError> {
        let call_id = uuid::Uuid::new_v4().to_string();
        let req = DeleteRequest { name: name.into() };
        let msg = Message::new(call_id.as_str(), MessageType::Delete, Some(&req))?;
        self.send_msg(&msg).await?;

        let reply = self.recv_reply(&call_id).await?;
        expect_payload(reply, MessageType::DeleteAck)
    }
}

/// Turns an error envelope into a [`ClientError::Server`].
fn check_error(msg: Message) -> Result<Message, ClientError> {
    if msg.msg_type == MessageType::Error {
        let err = msg.error.unwrap_or(filedepot_protocol::WsError {
            code: 0,
            message: "unknown error".into(),
        });
        return Err(ClientError::Server {
            code: err.code,
            message: err.message,
        });
    }
    Ok(msg)
}

/// Parses the payload of a reply after checking its type.
fn expect_payload<T: for<'de> serde::Deserialize<'de>>(
    msg: Message,
    expected: MessageType,
) -> Result<T, ClientError> {
    if msg.msg_type != expected {
        return Err(ClientError::UnexpectedReply(format!(
            "{:?} (expected {expected:?})",
            msg.msg_type
        )));
    }
    msg.parse_payload()?
        .ok_or_else(|| ClientError::UnexpectedReply("missing payload".into()))
}

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Derives the object name from the file's final path component.
pub fn name_from_path(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}
