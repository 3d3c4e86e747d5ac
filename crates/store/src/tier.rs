//! The capability interface one physical storage medium presents to the
//! tiered store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

/// Errors produced by a single tier. Internal to this crate: the tiered
/// store translates every variant into a fallback decision and never lets
/// one reach a client.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("object not found")]
    NotFound,

    #[error("tier unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata one tier reports for an object.
#[derive(Debug, Clone, PartialEq)]
pub struct TierStat {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Opaque version tag: HTTP ETag, or a local equivalent derived from
    /// mtime and size.
    pub version: String,
}

/// A streaming read handle for one stored object.
///
/// Wraps whatever the tier can produce (an in-memory buffer, an open file,
/// or an HTTP response body) behind one `AsyncRead`, so emission never
/// needs the whole object resident at once.
pub struct ByteSource {
    size: Option<u64>,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl ByteSource {
    /// Source backed by an in-memory buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            size: Some(size),
            reader: Box::new(std::io::Cursor::new(bytes)),
        }
    }

    /// Source backed by an open file.
    pub fn from_file(file: tokio::fs::File, size: u64) -> Self {
        Self {
            size: Some(size),
            reader: Box::new(file),
        }
    }

    /// Source backed by an arbitrary reader (e.g. an HTTP response body).
    pub fn from_reader(reader: Box<dyn AsyncRead + Send + Unpin>, size: Option<u64>) -> Self {
        Self { size, reader }
    }

    /// Total size if the tier knew it up front.
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ByteSource {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

/// Raw put/get/stat/delete against one physical medium.
///
/// Implementations must be safe to call concurrently for distinct names;
/// same-name concurrent writes serialize at the tier (last writer wins).
#[async_trait]
pub trait StorageTier: Send + Sync {
    /// Short label for logs ("object-store", "local-disk").
    fn label(&self) -> &'static str;

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), TierError>;

    async fn get(&self, name: &str) -> Result<ByteSource, TierError>;

    async fn stat(&self, name: &str) -> Result<TierStat, TierError>;

    async fn delete(&self, name: &str) -> Result<(), TierError>;
}
