//! Reassembly of an ordered chunk stream into one complete byte sequence.

use crate::chunk::Chunk;
use crate::spool::{SpoolBuffer, UploadData};
use crate::{DEFAULT_SPOOL_THRESHOLD, TransferError};

/// The result of a finished upload: name, total size, and the bytes.
#[derive(Debug)]
pub struct CompletedUpload {
    pub name: String,
    pub size: u64,
    pub data: UploadData,
}

/// Consumes chunks for one upload call in arrival order.
///
/// The first accepted chunk fixes the object name for the whole call; any
/// later chunk bearing a different name fails the call. Zero-length
/// payloads are legal and count as liveness, not bytes.
pub struct ChunkAssembler {
    name: Option<String>,
    chunks: u64,
    buf: SpoolBuffer,
}

impl Default for ChunkAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SPOOL_THRESHOLD)
    }
}

impl ChunkAssembler {
    /// Creates an assembler that spills to disk above `spool_threshold` bytes.
    pub fn new(spool_threshold: usize) -> Self {
        Self {
            name: None,
            chunks: 0,
            buf: SpoolBuffer::new(spool_threshold),
        }
    }

    /// Accepts the next chunk of the stream.
    pub async fn accept(&mut self, chunk: Chunk) -> Result<(), TransferError> {
        match &self.name {
            None => self.name = Some(chunk.name.clone()),
            Some(expected) if *expected != chunk.name => {
                return Err(TransferError::NameMismatch {
                    expected: expected.clone(),
                    got: chunk.name,
                });
            }
            Some(_) => {}
        }

        if !chunk.verify() {
            return Err(TransferError::ChecksumMismatch);
        }

        self.chunks += 1;
        if !chunk.payload.is_empty() {
            self.buf.write(&chunk.payload).await?;
        }
        Ok(())
    }

    /// Finalizes the upload.
    ///
    /// Fails with [`TransferError::EmptyUpload`] if no chunk was ever
    /// accepted; a zero-byte file is one chunk with an empty payload, not
    /// an empty stream.
    pub async fn finish(mut self) -> Result<CompletedUpload, TransferError> {
        let name = match self.name.take() {
            Some(n) => n,
            None => return Err(TransferError::EmptyUpload),
        };
        let data = self.buf.finish().await?;
        Ok(CompletedUpload {
            name,
            size: data.len(),
            data,
        })
    }

    /// The object name pinned by the first chunk, if any chunk arrived yet.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Bytes accumulated so far.
    pub fn size(&self) -> u64 {
        self.buf.len()
    }

    /// Chunks accepted so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }
}
