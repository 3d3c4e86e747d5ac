//! Local-disk tier: one file per object under a flat root directory.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::tier::{ByteSource, StorageTier, TierError, TierStat};

/// Fallback/mirror tier backed by the local filesystem.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so same-name concurrent writers serialize to last-writer-wins
/// and readers never observe a half-written object.
pub struct LocalDiskTier {
    root: PathBuf,
}

impl LocalDiskTier {
    /// Creates the tier, ensuring the root directory exists.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, TierError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The root directory objects live under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn map_io(e: std::io::Error) -> TierError {
    if e.kind() == std::io::ErrorKind::NotFound {
        TierError::NotFound
    } else {
        TierError::Io(e)
    }
}

/// Derives an opaque version tag from filesystem metadata.
fn version_tag(meta: &std::fs::Metadata) -> String {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .unwrap_or_default();
    format!(
        "{:x}{:08x}-{:x}",
        mtime.as_secs(),
        mtime.subsec_nanos(),
        meta.len()
    )
}

#[async_trait]
impl StorageTier for LocalDiskTier {
    fn label(&self) -> &'static str {
        "local-disk"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), TierError> {
        let tmp = self
            .root
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        if let Err(e) = file.write_all(bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, self.object_path(name)).await?;
        tracing::debug!(name, size = bytes.len(), "object written to local disk");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ByteSource, TierError> {
        let file = tokio::fs::File::open(self.object_path(name))
            .await
            .map_err(map_io)?;
        let size = file.metadata().await?.len();
        Ok(ByteSource::from_file(file, size))
    }

    async fn stat(&self, name: &str) -> Result<TierStat, TierError> {
        let meta = tokio::fs::metadata(self.object_path(name))
            .await
            .map_err(map_io)?;
        let last_modified: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(TierStat {
            size: meta.len(),
            last_modified,
            version: version_tag(&meta),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), TierError> {
        tokio::fs::remove_file(self.object_path(name))
            .await
            .map_err(map_io)?;
        tracing::debug!(name, "object deleted from local disk");
        Ok(())
    }
}
