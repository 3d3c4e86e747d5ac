//! Chunk assembly and emission for FileDepot transfers.
//!
//! [`ChunkAssembler`] consumes an ordered chunk stream for one upload and
//! produces a complete byte sequence without unbounded buffering (bytes
//! spill to disk above a threshold). [`ChunkEmitter`] slices a stored byte
//! source back into an ordered, bounded-size chunk stream for download.

mod assembler;
mod chunk;
mod emitter;
mod spool;

pub use assembler::{ChunkAssembler, CompletedUpload};
pub use chunk::{Chunk, checksum_bytes};
pub use emitter::ChunkEmitter;
pub use spool::{SpoolBuffer, UploadData};

/// Bytes held in memory per upload before spilling to a spool file (8 MiB).
pub const DEFAULT_SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload ended without any chunks")]
    EmptyUpload,

    #[error("chunk name {got:?} does not match upload name {expected:?}")]
    NameMismatch { expected: String, got: String },

    #[error("chunk checksum mismatch")]
    ChecksumMismatch,

    #[error("transfer interrupted: {0}")]
    Interrupted(String),
}
