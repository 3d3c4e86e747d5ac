//! Memory-bounded accumulation for in-flight uploads.
//!
//! Bytes stay in memory up to a threshold, then spill to a temp file so an
//! upload of any size never buffers unboundedly.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

enum SpoolState {
    Memory(Vec<u8>),
    File {
        file: tokio::fs::File,
        path: PathBuf,
        written: u64,
    },
    Finished,
}

/// Accumulating byte sink that spills to disk above a threshold.
pub struct SpoolBuffer {
    threshold: usize,
    state: SpoolState,
}

impl SpoolBuffer {
    /// Creates a buffer that spills once more than `threshold` bytes are held.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            state: SpoolState::Memory(Vec::new()),
        }
    }

    /// Appends bytes, spilling to a temp file when the threshold is crossed.
    pub async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.state {
            SpoolState::Memory(buf) => {
                if buf.len() + bytes.len() <= self.threshold {
                    buf.extend_from_slice(bytes);
                    return Ok(());
                }

                // Crossed the threshold: move everything to a spool file.
                let path =
                    std::env::temp_dir().join(format!("depot-spool-{}", uuid::Uuid::new_v4()));
                let mut file = tokio::fs::File::create(&path).await?;
                file.write_all(buf).await?;
                file.write_all(bytes).await?;
                let written = (buf.len() + bytes.len()) as u64;
                tracing::debug!(path = %path.display(), written, "upload spilled to spool file");
                self.state = SpoolState::File {
                    file,
                    path,
                    written,
                };
                Ok(())
            }
            SpoolState::File { file, written, .. } => {
                file.write_all(bytes).await?;
                *written += bytes.len() as u64;
                Ok(())
            }
            SpoolState::Finished => Err(std::io::Error::other("spool buffer already finished")),
        }
    }

    /// Total bytes accumulated so far.
    pub fn len(&self) -> u64 {
        match &self.state {
            SpoolState::Memory(buf) => buf.len() as u64,
            SpoolState::File { written, .. } => *written,
            SpoolState::Finished => 0,
        }
    }

    /// Returns `true` if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes and converts the accumulated bytes into an [`UploadData`].
    pub async fn finish(&mut self) -> std::io::Result<UploadData> {
        match std::mem::replace(&mut self.state, SpoolState::Finished) {
            SpoolState::Memory(buf) => Ok(UploadData::Memory(buf)),
            SpoolState::File {
                mut file,
                path,
                written,
            } => {
                file.flush().await?;
                drop(file);
                Ok(UploadData::Spooled {
                    path,
                    size: written,
                })
            }
            SpoolState::Finished => Err(std::io::Error::other("spool buffer already finished")),
        }
    }
}

impl Drop for SpoolBuffer {
    fn drop(&mut self) {
        // An aborted upload leaves a spool file behind; remove it.
        if let SpoolState::File { path, .. } = &self.state {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// The assembled bytes of a completed upload.
#[derive(Debug)]
pub enum UploadData {
    Memory(Vec<u8>),
    Spooled { path: PathBuf, size: u64 },
}

impl UploadData {
    /// Total byte length.
    pub fn len(&self) -> u64 {
        match self {
            UploadData::Memory(buf) => buf.len() as u64,
            UploadData::Spooled { size, .. } => *size,
        }
    }

    /// Returns `true` if the upload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads out the full byte sequence, removing any spool file.
    pub async fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self {
            UploadData::Memory(buf) => Ok(buf),
            UploadData::Spooled { path, .. } => {
                let bytes = tokio::fs::read(&path).await?;
                let _ = tokio::fs::remove_file(&path).await;
                Ok(bytes)
            }
        }
    }

    /// Drops the data, removing any spool file.
    pub async fn discard(self) {
        if let UploadData::Spooled { path, .. } = self {
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
}
