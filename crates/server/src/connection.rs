//! Client connection management: read/write pumps, ping/pong, send buffering.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use filedepot_protocol::constants::{
    ERR_CODE_NOT_IMPLEMENTED, MessageType, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT,
};
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::parse_chunk_frame;

use crate::SEND_BUFFER_SIZE;
use crate::handler::Handler;

/// A frame queued for sending to the client.
#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    Pong(Vec<u8>),
}

/// Handle for sending messages to one connected client.
///
/// Cloneable and cheap — wraps an `mpsc::Sender`. Carries the connection
/// id so handlers can key per-call state without cross-client collisions.
#[derive(Clone)]
pub struct Sender {
    conn_id: Arc<str>,
    tx: mpsc::Sender<Outbound>,
}

impl Sender {
    /// Creates a detached sender and its receiving end.
    ///
    /// The transport wires the receiver into a write pump; embedders and
    /// tests can drain it directly.
    pub fn channel(conn_id: impl Into<String>) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(SEND_BUFFER_SIZE);
        (
            Self {
                conn_id: Arc::from(conn_id.into()),
                tx,
            },
            rx,
        )
    }

    /// Unique id of the underlying connection.
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Sends a protocol [`Message`] as JSON text.
    ///
    /// Control replies are small and must never block a pump, so this uses
    /// `try_send`; an error means the buffer is full or the client is gone.
    pub fn send_msg(&self, msg: Message) -> Result<(), SendError> {
        let json = serde_json::to_string(&msg).map_err(|_| SendError)?;
        self.tx.try_send(Outbound::Text(json)).map_err(|_| {
            tracing::warn!("send buffer full or closed, dropping message");
            SendError
        })
    }

    /// Sends an error response for the given request message.
    pub fn send_error(&self, req: &Message, code: i32, message: &str) -> Result<(), SendError> {
        self.send_msg(req.reply_error(code, message))
    }

    /// Sends a binary chunk frame, waiting for buffer capacity.
    ///
    /// Streaming sends await rather than drop: a dropped chunk would
    /// corrupt the download, and the await is the transport backpressure
    /// that bounds per-call memory.
    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), SendError> {
        self.tx
            .send(Outbound::Binary(data))
            .await
            .map_err(|_| SendError)
    }

    /// Returns `true` if the send channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Error returned when the send channel is full or closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: buffer full or connection closed")]
pub struct SendError;

/// Runs the read and write pumps for one client connection.
///
/// The pumps stop when the client disconnects or the server cancel token
/// fires; the read pump then invokes the handler's disconnect hook.
pub fn spawn_connection<S, H>(
    ws_stream: S,
    conn_id: String,
    handler: Arc<H>,
    server_cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
    H: Handler,
{
    let (sender, rx) = Sender::channel(conn_id.clone());
    let cancel = server_cancel.child_token();

    let (ws_sink, ws_stream) = ws_stream.split();

    // Write pump.
    tokio::spawn(write_pump(ws_sink, rx, cancel.clone()));

    // Read pump.
    let read_cancel = cancel.clone();
    tokio::spawn(async move {
        read_pump(ws_stream, sender, Arc::clone(&handler), read_cancel.clone()).await;
        // When the read pump exits, stop the write pump too.
        read_cancel.cancel();
        tracing::info!(conn_id = %conn_id, "client disconnected");
        handler.on_client_disconnected(conn_id).await;
    });
}

/// Write pump: drains the send channel and sends WS pings.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<Outbound>, cancel: CancellationToken)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = rx.recv() => {
                let ws_msg = match frame {
                    Some(Outbound::Text(json)) => WsMessage::Text(json.into()),
                    Some(Outbound::Binary(data)) => WsMessage::Binary(data.into()),
                    Some(Outbound::Pong(data)) => WsMessage::Pong(data.into()),
                    None => break, // Channel closed.
                };
                if let Err(e) = sink.send(ws_msg).await {
                    tracing::error!("write pump send error: {e}");
                    break;
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.close().await;
}

/// Read pump: reads WS frames and dispatches to the handler in order.
async fn read_pump<S, H>(mut stream: S, sender: Sender, handler: Arc<H>, cancel: CancellationToken)
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
    H: Handler,
{
    let mut pong_deadline = tokio::time::interval(WS_PONG_WAIT);
    pong_deadline.reset();
    let mut got_pong = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = pong_deadline.tick() => {
                if !got_pong {
                    tracing::warn!("pong timeout, closing connection");
                    break;
                }
                got_pong = false;
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(ws_msg)) => {
                        match ws_msg {
                            WsMessage::Text(text) => {
                                if text.len() > WS_MAX_MESSAGE_SIZE {
                                    tracing::error!("message exceeds max size ({} > {})", text.len(), WS_MAX_MESSAGE_SIZE);
                                    continue;
                                }
                                dispatch_text(&handler, &sender, &text).await;
                            }
                            WsMessage::Binary(data) => {
                                if data.len() > WS_MAX_MESSAGE_SIZE {
                                    tracing::error!("binary frame exceeds max size ({} > {})", data.len(), WS_MAX_MESSAGE_SIZE);
                                    continue;
                                }
                                dispatch_binary(&handler, &sender, &data).await;
                            }
                            WsMessage::Pong(_) => {
                                got_pong = true;
                                pong_deadline.reset();
                            }
                            WsMessage::Ping(data) => {
                                // Auto-respond to transport pings.
                                let _ = sender.tx.try_send(Outbound::Pong(data.into()));
                            }
                            WsMessage::Close(_) => {
                                tracing::debug!("received close frame");
                                break;
                            }
                            WsMessage::Frame(_) => {} // Raw frames ignored.
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("read pump error: {e}");
                        break;
                    }
                    None => break, // Stream ended.
                }
            }
        }
    }
}

/// Dispatches a text (JSON) envelope to the appropriate handler method.
async fn dispatch_text<H: Handler>(handler: &Arc<H>, sender: &Sender, text: &str) {
    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("invalid message JSON: {e}");
            return;
        }
    };

    let s = sender.clone();
    match msg.msg_type {
        MessageType::UploadEnd => handler.on_upload_end(s, msg).await,
        MessageType::UploadCancel => handler.on_upload_cancel(s, msg).await,
        MessageType::Download => handler.on_download(s, msg).await,
        MessageType::GetMetadata => handler.on_get_metadata(s, msg).await,
        MessageType::Delete => handler.on_delete(s, msg).await,
        MessageType::Ping => handler.on_ping(s, msg).await,
        _ => {
            tracing::warn!(msg_type = ?msg.msg_type, "unhandled message type");
            let _ = sender.send_error(&msg, ERR_CODE_NOT_IMPLEMENTED, "unknown message type");
        }
    }
}

/// Dispatches a binary chunk frame to the handler.
async fn dispatch_binary<H: Handler>(handler: &Arc<H>, sender: &Sender, data: &[u8]) {
    match parse_chunk_frame(data) {
        Ok((header, payload)) => {
            handler.on_chunk(sender.clone(), header, payload).await;
        }
        Err(e) => {
            tracing::error!("failed to parse chunk frame: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_error_display() {
        let err = SendError;
        assert!(err.to_string().contains("buffer full"));
    }

    #[tokio::test]
    async fn sender_channel_delivers_text() {
        let (sender, mut rx) = Sender::channel("conn-1");
        assert_eq!(sender.conn_id(), "conn-1");

        let msg = Message::new::<()>("m1", MessageType::Ping, None).unwrap();
        sender.send_msg(msg).unwrap();

        match rx.recv().await.unwrap() {
            Outbound::Text(json) => assert!(json.contains("ping")),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sender_channel_delivers_binary() {
        let (sender, mut rx) = Sender::channel("conn-2");
        sender.send_binary(vec![1, 2, 3]).await.unwrap();
        match rx.recv().await.unwrap() {
            Outbound::Binary(data) => assert_eq!(data, vec![1, 2, 3]),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sender_disconnected_after_receiver_drop() {
        let (sender, rx) = Sender::channel("conn-3");
        assert!(sender.is_connected());
        drop(rx);
        assert!(!sender.is_connected());
        assert!(sender.send_binary(vec![0]).await.is_err());
    }
}
