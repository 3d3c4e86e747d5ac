//! Upload call handling: chunk ingestion, finalization, cancellation.

use filedepot_protocol::constants::{
    ERR_CODE_BAD_REQUEST, ERR_CODE_EMPTY_UPLOAD, ERR_CODE_INTERNAL, ERR_CODE_INTERRUPTED,
    ERR_CODE_NAME_MISMATCH, MessageType,
};
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::ChunkHeader;
use filedepot_protocol::messages::{CancelAck, UploadAck};
use filedepot_server::Sender;
use filedepot_store::validate_object_name;
use filedepot_transfer::{Chunk, ChunkAssembler, TransferError};

use crate::service::{CallKey, TransferService, store_error_reply};
use crate::states::UploadState;

/// One in-flight upload call.
///
/// Created by the first chunk frame bearing its call id, destroyed on ack,
/// failure, cancellation, or client disconnect. A failed call lingers so
/// that further chunks are ignored and `upload_end` reports the original
/// failure.
pub(crate) struct UploadCall {
    state: UploadState,
    assembler: Option<ChunkAssembler>,
    failure: Option<(i32, String)>,
}

impl UploadCall {
    fn new(spool_threshold: usize) -> Self {
        Self {
            state: UploadState::Receiving,
            assembler: Some(ChunkAssembler::new(spool_threshold)),
            failure: None,
        }
    }

    fn failed(code: i32, message: String) -> Self {
        Self {
            state: UploadState::Failed,
            assembler: None,
            failure: Some((code, message)),
        }
    }

    fn set_state(&mut self, next: UploadState) {
        debug_assert!(self.state.can_transition(next));
        self.state = next;
    }

    /// Fails the call, dropping the assembler (which cleans any spool file).
    fn fail(&mut self, code: i32, message: String) {
        self.set_state(UploadState::Failed);
        self.assembler = None;
        self.failure = Some((code, message));
    }

    fn is_failed(&self) -> bool {
        self.state == UploadState::Failed
    }
}

/// Maps a transfer error to its wire code and text.
fn transfer_error_reply(e: &TransferError) -> (i32, String) {
    let code = match e {
        TransferError::NameMismatch { .. } => ERR_CODE_NAME_MISMATCH,
        TransferError::EmptyUpload => ERR_CODE_EMPTY_UPLOAD,
        TransferError::ChecksumMismatch => ERR_CODE_BAD_REQUEST,
        TransferError::Interrupted(_) => ERR_CODE_INTERRUPTED,
        TransferError::Io(_) => ERR_CODE_INTERNAL,
    };
    (code, e.to_string())
}

impl TransferService {
    pub(crate) async fn handle_chunk(&self, sender: Sender, header: ChunkHeader, payload: Vec<u8>) {
        let key: CallKey = (sender.conn_id().to_string(), header.id.clone());

        // Take the call out of the map so tier/spool I/O below never runs
        // under the map lock. Chunks of one call arrive sequentially on its
        // connection pump, so nobody else can touch this key meanwhile.
        let existing = self.uploads.lock().await.remove(&key);

        let mut call = match existing {
            Some(call) => {
                if call.is_failed() {
                    // The call already failed and was answered; ignore the
                    // remainder of the stream.
                    tracing::debug!(call = %header.id, "dropping chunk for failed upload call");
                    self.uploads.lock().await.insert(key, call);
                    return;
                }
                call
            }
            None => {
                // First chunk: validate the name before touching anything.
                if let Err(e) = validate_object_name(&header.name) {
                    let (code, text) = store_error_reply(&e);
                    tracing::warn!(call = %header.id, error = %text, "upload rejected");
                    let _ = sender.send_msg(Message::error(header.id.clone(), code, text.as_str()));
                    self.uploads
                        .lock()
                        .await
                        .insert(key, UploadCall::failed(code, text));
                    return;
                }
                tracing::debug!(
                    call = %header.id,
                    name = %header.name,
                    "upload call receiving"
                );
                UploadCall::new(self.spool_threshold)
            }
        };

        let chunk = Chunk {
            name: header.name,
            payload,
            checksum: header.checksum,
        };

        let assembler = match call.assembler.as_mut() {
            Some(a) => a,
            None => return, // Unreachable: non-failed calls always hold one.
        };

        if let Err(e) = assembler.accept(chunk).await {
            let (code, text) = transfer_error_reply(&e);
            tracing::warn!(call = %header.id, error = %text, "upload chunk rejected");
            let _ = sender.send_msg(Message::error(header.id.clone(), code, text.as_str()));
            call.fail(code, text);
        }

        self.uploads.lock().await.insert(key, call);
    }

    pub(crate) async fn handle_upload_end(&self, sender: Sender, msg: Message) {
        let key: CallKey = (sender.conn_id().to_string(), msg.id.clone());
        let call = self.uploads.lock().await.remove(&key);

        let mut call = match call {
            None => {
                // No call means no chunk ever arrived. A zero-byte file is
                // one empty chunk; an empty stream is a protocol error.
                let _ = sender.send_error(
                    &msg,
                    ERR_CODE_EMPTY_UPLOAD,
                    "upload ended without any chunks",
                );
                return;
            }
            Some(call) if call.is_failed() => {
                let (code, text) = call
                    .failure
                    .unwrap_or((ERR_CODE_INTERNAL, "upload failed".into()));
                let _ = sender.send_error(&msg, code, &text);
                return;
            }
            Some(call) => call,
        };

        call.set_state(UploadState::Finalizing);
        let assembler = match call.assembler.take() {
            Some(a) => a,
            None => {
                let _ = sender.send_error(&msg, ERR_CODE_INTERNAL, "upload state lost");
                return;
            }
        };

        let completed = match assembler.finish().await {
            Ok(c) => c,
            Err(e) => {
                let (code, text) = transfer_error_reply(&e);
                call.set_state(UploadState::Failed);
                let _ = sender.send_error(&msg, code, &text);
                return;
            }
        };

        let bytes = match completed.data.into_bytes().await {
            Ok(b) => b,
            Err(e) => {
                call.set_state(UploadState::Failed);
                tracing::error!(name = %completed.name, error = %e, "failed to read assembled upload");
                let _ = sender.send_error(&msg, ERR_CODE_INTERNAL, "failed to read upload data");
                return;
            }
        };

        match self.store.put(&completed.name, completed.size, &bytes).await {
            Ok(ack) => {
                call.set_state(UploadState::Acked);
                tracing::info!(
                    name = %completed.name,
                    size = ack.size,
                    tier_of_record = %ack.tier_of_record,
                    "upload stored"
                );
                let payload = UploadAck {
                    message: format!("stored {} ({} bytes)", completed.name, ack.size),
                    tier_of_record: ack.tier_of_record,
                    size: ack.size,
                };
                if let Ok(reply) = msg.reply(MessageType::UploadAck, Some(&payload)) {
                    let _ = sender.send_msg(reply);
                }
            }
            Err(e) => {
                call.set_state(UploadState::Failed);
                let (code, text) = store_error_reply(&e);
                let _ = sender.send_error(&msg, code, &text);
            }
        }
    }

    pub(crate) async fn handle_upload_cancel(&self, sender: Sender, msg: Message) {
        let key: CallKey = (sender.conn_id().to_string(), msg.id.clone());
        if let Some(call) = self.uploads.lock().await.remove(&key) {
            // Dropping the call drops its assembler, which removes any
            // spool file. Nothing was persisted to either tier.
            drop(call);
            tracing::info!(call = %msg.id, "upload cancelled");
        }

        let ack = CancelAck {
            message: "cancelled".into(),
        };
        if let Ok(reply) = msg.reply(MessageType::CancelAck, Some(&ack)) {
            let _ = sender.send_msg(reply);
        }
    }

    pub(crate) async fn handle_disconnect(&self, conn_id: &str) {
        let mut uploads = self.uploads.lock().await;
        let before = uploads.len();
        uploads.retain(|(conn, _), _| conn != conn_id);
        let dropped = before - uploads.len();
        if dropped > 0 {
            tracing::debug!(conn_id, dropped, "dropped upload calls for disconnected client");
        }
    }
}
