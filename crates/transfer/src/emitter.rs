//! Emission of a stored byte source as an ordered, bounded chunk stream.

use tokio::io::{AsyncRead, AsyncReadExt};

use filedepot_protocol::constants::DEFAULT_CHUNK_SIZE;

use crate::TransferError;
use crate::chunk::Chunk;

/// Reads a byte source in fixed-size chunks for a download stream.
///
/// Chunks come out in offset order with no gaps or overlaps; concatenating
/// every payload reproduces the stored bytes exactly. Only the final chunk
/// may be shorter than the configured bound.
pub struct ChunkEmitter<R> {
    name: String,
    source: R,
    chunk_size: usize,
    offset: u64,
    done: bool,
}

impl<R: AsyncRead + Unpin> ChunkEmitter<R> {
    /// Creates an emitter over `source`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (64 KiB) is used.
    pub fn new(name: impl Into<String>, source: R, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            name: name.into(),
            source,
            chunk_size,
            offset: 0,
            done: false,
        }
    }

    /// Emits the next chunk. Returns `None` at end of stream.
    ///
    /// A read failure after the source was opened maps to
    /// [`TransferError::Interrupted`]; emission stops and the call must be
    /// failed; bytes already sent cannot be retracted.
    pub async fn next(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self
                .source
                .read(&mut buf[filled..])
                .await
                .map_err(|e| TransferError::Interrupted(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.done = true;
            return Ok(None);
        }
        if filled < self.chunk_size {
            // Short fill means EOF; don't issue another read next call.
            self.done = true;
        }
        buf.truncate(filled);
        self.offset += filled as u64;
        Ok(Some(Chunk::with_checksum(&self.name, buf)))
    }

    /// Bytes emitted so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}
