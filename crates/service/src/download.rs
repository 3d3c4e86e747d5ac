//! Download call handling: resolve, then stream chunk frames.

use filedepot_protocol::constants::{ERR_CODE_BAD_REQUEST, ERR_CODE_INTERRUPTED, MessageType};
use filedepot_protocol::envelope::Message;
use filedepot_protocol::frame::{ChunkHeader, encode_chunk_frame};
use filedepot_protocol::messages::{DownloadDone, DownloadRequest};
use filedepot_server::Sender;
use filedepot_transfer::ChunkEmitter;

use crate::service::{TransferService, store_error_reply};
use crate::states::DownloadState;

impl TransferService {
    pub(crate) async fn handle_download(&self, sender: Sender, msg: Message) {
        let req: DownloadRequest = match msg.parse_payload() {
            Ok(Some(r)) => r,
            _ => {
                let _ = sender.send_error(&msg, ERR_CODE_BAD_REQUEST, "invalid payload");
                return;
            }
        };

        let state = DownloadState::Resolving;
        tracing::debug!(call = %msg.id, name = %req.name, "download call resolving");

        // Fail fast: NotFound is decided before any bytes go out.
        let source = match self.store.get(&req.name).await {
            Ok(source) => source,
            Err(e) => {
                debug_assert!(state.can_transition(DownloadState::Failed));
                let (code, text) = store_error_reply(&e);
                let _ = sender.send_error(&msg, code, &text);
                return;
            }
        };

        debug_assert!(state.can_transition(DownloadState::Streaming));
        let state = DownloadState::Streaming;
        let mut emitter = ChunkEmitter::new(&req.name, source, self.chunk_size);
        let name = req.name;

        // The stream runs in its own task: one concurrent task per call,
        // suspended only at chunk reads and outbound sends.
        tokio::spawn(async move {
            loop {
                match emitter.next().await {
                    Ok(Some(chunk)) => {
                        let header = ChunkHeader {
                            id: msg.id.clone(),
                            name: name.clone(),
                            checksum: chunk.checksum.clone(),
                        };
                        let frame = match encode_chunk_frame(&header, &chunk.payload) {
                            Ok(f) => f,
                            Err(e) => {
                                debug_assert!(state.can_transition(DownloadState::Failed));
                                tracing::error!(name = %name, error = %e, "failed to encode chunk frame");
                                let _ =
                                    sender.send_error(&msg, ERR_CODE_INTERRUPTED, &e.to_string());
                                return;
                            }
                        };
                        if sender.send_binary(frame).await.is_err() {
                            // Client went away; stop within one send and
                            // release the source. Nothing to clean up on
                            // the tiers.
                            debug_assert!(state.can_transition(DownloadState::Failed));
                            tracing::debug!(name = %name, "client disconnected mid-download");
                            return;
                        }
                    }
                    Ok(None) => {
                        debug_assert!(state.can_transition(DownloadState::Completed));
                        let done = DownloadDone {
                            name: name.clone(),
                            size: emitter.offset(),
                        };
                        tracing::info!(name = %name, size = done.size, "download completed");
                        if let Ok(reply) = msg.reply(MessageType::DownloadDone, Some(&done)) {
                            let _ = sender.send_msg(reply);
                        }
                        return;
                    }
                    Err(e) => {
                        // The source died after open: already-sent bytes
                        // cannot be retracted, the client must discard the
                        // partial output.
                        debug_assert!(state.can_transition(DownloadState::Failed));
                        tracing::warn!(name = %name, error = %e, "download interrupted mid-stream");
                        let _ = sender.send_error(&msg, ERR_CODE_INTERRUPTED, &e.to_string());
                        return;
                    }
                }
            }
        });
    }
}
