//! Transfer orchestration for FileDepot.
//!
//! [`TransferService`] implements the transport's `Handler` trait and owns
//! the per-call state machines that bind chunk assembly and emission to
//! the tiered store.

mod download;
mod service;
mod states;
mod upload;

pub use service::TransferService;
pub use states::{DownloadState, UploadState};

pub use filedepot_transfer::DEFAULT_SPOOL_THRESHOLD;
