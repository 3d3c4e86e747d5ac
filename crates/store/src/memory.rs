//! In-memory tier for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::tier::{ByteSource, StorageTier, TierError, TierStat};

struct StoredBytes {
    bytes: Vec<u8>,
    last_modified: DateTime<Utc>,
    version: String,
}

/// Memory-backed tier with failure injection.
///
/// `set_available(false)` makes every operation fail as if the medium were
/// unreachable, which is how tier outages are simulated in tests.
pub struct MemoryTier {
    label: &'static str,
    objects: Mutex<HashMap<String, StoredBytes>>,
    available: AtomicBool,
    versions: AtomicU64,
}

impl MemoryTier {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            objects: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            versions: AtomicU64::new(0),
        }
    }

    /// Toggles simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the stored bytes for `name`, if present.
    pub async fn bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(name).map(|o| o.bytes.clone())
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    /// Returns `true` if no objects are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> Result<(), TierError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TierError::Unavailable(format!("{} is down", self.label)))
        }
    }
}

#[async_trait]
impl StorageTier for MemoryTier {
    fn label(&self) -> &'static str {
        self.label
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), TierError> {
        self.check_available()?;
        let version = format!("v{}", self.versions.fetch_add(1, Ordering::SeqCst) + 1);
        self.objects.lock().await.insert(
            name.to_string(),
            StoredBytes {
                bytes: bytes.to_vec(),
                last_modified: Utc::now(),
                version,
            },
        );
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ByteSource, TierError> {
        self.check_available()?;
        let objects = self.objects.lock().await;
        let stored = objects.get(name).ok_or(TierError::NotFound)?;
        Ok(ByteSource::from_bytes(stored.bytes.clone()))
    }

    async fn stat(&self, name: &str) -> Result<TierStat, TierError> {
        self.check_available()?;
        let objects = self.objects.lock().await;
        let stored = objects.get(name).ok_or(TierError::NotFound)?;
        Ok(TierStat {
            size: stored.bytes.len() as u64,
            last_modified: stored.last_modified,
            version: stored.version.clone(),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), TierError> {
        self.check_available()?;
        self.objects
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or(TierError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn put_get_stat_delete() {
        let tier = MemoryTier::new("mem");
        tier.put("a.bin", b"data").await.unwrap();

        let mut src = tier.get("a.bin").await.unwrap();
        let mut out = Vec::new();
        src.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"data");

        let stat = tier.stat("a.bin").await.unwrap();
        assert_eq!(stat.size, 4);
        assert_eq!(stat.version, "v1");

        tier.delete("a.bin").await.unwrap();
        assert!(matches!(
            tier.get("a.bin").await.unwrap_err(),
            TierError::NotFound
        ));
    }

    #[tokio::test]
    async fn versions_advance_on_overwrite() {
        let tier = MemoryTier::new("mem");
        tier.put("a.bin", b"one").await.unwrap();
        tier.put("a.bin", b"two").await.unwrap();
        let stat = tier.stat("a.bin").await.unwrap();
        assert_eq!(stat.version, "v2");
    }

    #[tokio::test]
    async fn unavailable_fails_every_operation() {
        let tier = MemoryTier::new("mem");
        tier.put("a.bin", b"data").await.unwrap();
        tier.set_available(false);

        assert!(matches!(
            tier.put("b.bin", b"x").await.unwrap_err(),
            TierError::Unavailable(_)
        ));
        assert!(matches!(
            tier.get("a.bin").await.unwrap_err(),
            TierError::Unavailable(_)
        ));
        assert!(matches!(
            tier.stat("a.bin").await.unwrap_err(),
            TierError::Unavailable(_)
        ));
        assert!(matches!(
            tier.delete("a.bin").await.unwrap_err(),
            TierError::Unavailable(_)
        ));

        // Bytes survive the outage.
        tier.set_available(true);
        assert_eq!(tier.bytes("a.bin").await.unwrap(), b"data");
    }
}
