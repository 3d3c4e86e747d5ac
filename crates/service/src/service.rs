//! The RPC-facing orchestrator binding chunk assembly/emission to the
//! tiered store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use filedepot_protocol::constants::{
    DEFAULT_CHUNK_SIZE, ERR_CODE_BAD_REQUEST, ERR_CODE_NOT_FOUND, ERR_CODE_PERSIST_FAILED,
    MessageType,
};
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::ChunkHeader;
use filedepot_protocol::messages::{DeleteAck, DeleteRequest, MetadataRequest};
use filedepot_server::{Handler, HandlerFuture, Sender};
use filedepot_store::{StoreError, TieredStore};
use filedepot_transfer::DEFAULT_SPOOL_THRESHOLD;

use crate::upload::UploadCall;

/// Key for one in-flight upload call: (connection id, call id).
///
/// Call ids are client-chosen, so the connection id keeps two clients that
/// picked the same id apart.
pub(crate) type CallKey = (String, String);

/// Implements the four storage operations over the chunk protocol.
///
/// Holds only ephemeral per-call state; everything durable lives behind
/// the [`TieredStore`].
pub struct TransferService {
    pub(crate) store: Arc<TieredStore>,
    pub(crate) chunk_size: usize,
    pub(crate) spool_threshold: usize,
    pub(crate) uploads: Mutex<HashMap<CallKey, UploadCall>>,
}

impl TransferService {
    pub fn new(store: Arc<TieredStore>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            uploads: Mutex::new(HashMap::new()),
        }
    }

    /// Size of emitted download chunks.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Per-upload memory bound before spilling to disk.
    pub fn with_spool_threshold(mut self, threshold: usize) -> Self {
        self.spool_threshold = threshold;
        self
    }

    async fn handle_get_metadata(&self, sender: Sender, msg: Message) {
        let req: MetadataRequest = match msg.parse_payload() {
            Ok(Some(r)) => r,
            _ => {
                let _ = sender.send_error(&msg, ERR_CODE_BAD_REQUEST, "invalid payload");
                return;
            }
        };

        match self.store.stat(&req.name).await {
            Ok(info) => {
                if let Ok(reply) = msg.reply(MessageType::Metadata, Some(&info)) {
                    let _ = sender.send_msg(reply);
                }
            }
            Err(e) => {
                let (code, text) = store_error_reply(&e);
                let _ = sender.send_error(&msg, code, &text);
            }
        }
    }

    async fn handle_delete(&self, sender: Sender, msg: Message) {
        let req: DeleteRequest = match msg.parse_payload() {
            Ok(Some(r)) => r,
            _ => {
                let _ = sender.send_error(&msg, ERR_CODE_BAD_REQUEST, "invalid payload");
                return;
            }
        };

        match self.store.delete(&req.name).await {
            Ok(outcome) => {
                tracing::info!(name = %req.name, ?outcome, "object deleted");
                let ack = DeleteAck {
                    message: format!("deleted {}", req.name),
                };
                if let Ok(reply) = msg.reply(MessageType::DeleteAck, Some(&ack)) {
                    let _ = sender.send_msg(reply);
                }
            }
            Err(e) => {
                let (code, text) = store_error_reply(&e);
                let _ = sender.send_error(&msg, code, &text);
            }
        }
    }
}

/// Maps a store error to its wire code and text.
pub(crate) fn store_error_reply(e: &StoreError) -> (i32, String) {
    let code = match e {
        StoreError::InvalidName(_) => ERR_CODE_BAD_REQUEST,
        StoreError::NotFound(_) => ERR_CODE_NOT_FOUND,
        StoreError::PersistFailed(_) => ERR_CODE_PERSIST_FAILED,
    };
    (code, e.to_string())
}

impl Handler for TransferService {
    fn on_chunk(&self, sender: Sender, header: ChunkHeader, payload: Vec<u8>) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_chunk(sender, header, payload).await })
    }

    fn on_upload_end(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_upload_end(sender, msg).await })
    }

    fn on_upload_cancel(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_upload_cancel(sender, msg).await })
    }

    fn on_download(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_download(sender, msg).await })
    }

    fn on_get_metadata(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_get_metadata(sender, msg).await })
    }

    fn on_delete(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_delete(sender, msg).await })
    }

    fn on_client_disconnected(&self, conn_id: String) -> HandlerFuture<'_> {
        Box::pin(async move { self.handle_disconnect(&conn_id).await })
    }
}
