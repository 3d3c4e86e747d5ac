//! Handler trait for processing WebSocket messages.
//!
//! Implementors provide the storage logic while the transport handles
//! connection management, framing, and routing.

use std::future::Future;
use std::pin::Pin;

use filedepot_protocol::constants::ERR_CODE_NOT_IMPLEMENTED;
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::ChunkHeader;

use crate::connection::Sender;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Trait for handling messages from a connected client.
///
/// Each method receives the connection's [`Sender`] for replies and the
/// parsed envelope (or chunk frame). Frames of one connection are
/// dispatched sequentially in arrival order, so chunk ordering within an
/// upload is preserved end-to-end.
///
/// Default implementations reply "not implemented" so handlers only need
/// to override the message types they care about.
pub trait Handler: Send + Sync + 'static {
    /// Called for each binary chunk frame of an upload stream.
    fn on_chunk(&self, sender: Sender, header: ChunkHeader, payload: Vec<u8>) -> HandlerFuture<'_> {
        let _ = (header, payload);
        Box::pin(async move {
            tracing::warn!("chunk frame received but handler not implemented");
            let _ = sender;
        })
    }

    /// Called for `upload_end`.
    fn on_upload_end(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, ERR_CODE_NOT_IMPLEMENTED, "not implemented");
        })
    }

    /// Called for `upload_cancel`.
    fn on_upload_cancel(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, ERR_CODE_NOT_IMPLEMENTED, "not implemented");
        })
    }

    /// Called for `download`.
    fn on_download(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, ERR_CODE_NOT_IMPLEMENTED, "not implemented");
        })
    }

    /// Called for `get_metadata`.
    fn on_get_metadata(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, ERR_CODE_NOT_IMPLEMENTED, "not implemented");
        })
    }

    /// Called for `delete`.
    fn on_delete(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let _ = sender.send_error(&msg, ERR_CODE_NOT_IMPLEMENTED, "not implemented");
        })
    }

    /// Called for `ping`.
    fn on_ping(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            if let Ok(reply) = msg.reply(
                filedepot_protocol::MessageType::Pong,
                Option::<&()>::None,
            ) {
                let _ = sender.send_msg(reply);
            }
        })
    }

    /// Called when a client disconnects (cleanup hook for in-flight calls).
    fn on_client_disconnected(&self, conn_id: String) -> HandlerFuture<'_> {
        let _ = conn_id;
        Box::pin(async {})
    }
}
