//! The consistency engine across the primary and fallback tiers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use filedepot_protocol::types::{ObjectInfo, TierOfRecord};

use crate::name::validate_object_name;
use crate::tier::{ByteSource, StorageTier, TierError};
use crate::{DEFAULT_TIER_OP_TIMEOUT, StoreError};

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutAck {
    pub tier_of_record: TierOfRecord,
    pub size: u64,
}

/// Which tiers a delete actually removed the object from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub primary: bool,
    pub fallback: bool,
}

/// Fans writes out to both tiers and reads in from the primary with
/// automatic fallback.
///
/// The primary (object store) is the durability source of truth; the
/// fallback (local disk) exists to serve reads when the primary is
/// transiently unavailable. Consequently a failed mirror write is logged,
/// not propagated ("soft mirror") unless `strict_mirror` is set.
///
/// Holds no per-call state; every operation is self-contained and safe to
/// run concurrently. Concurrent writers to the same name race: the last
/// put to complete wins *per tier*, so the two tiers may briefly hold
/// different versions of that name. Callers that need a defined winner
/// must serialize their own writes.
pub struct TieredStore {
    primary: Arc<dyn StorageTier>,
    fallback: Arc<dyn StorageTier>,
    strict_mirror: bool,
    op_timeout: Duration,
}

impl TieredStore {
    pub fn new(primary: Arc<dyn StorageTier>, fallback: Arc<dyn StorageTier>) -> Self {
        Self {
            primary,
            fallback,
            strict_mirror: false,
            op_timeout: DEFAULT_TIER_OP_TIMEOUT,
        }
    }

    /// When set, a failed mirror write fails the whole put (the primary
    /// copy is still not rolled back).
    pub fn with_strict_mirror(mut self, strict: bool) -> Self {
        self.strict_mirror = strict;
        self
    }

    /// Per-tier-operation deadline; a tier that exceeds it counts as failed
    /// for fallback decisions.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    async fn deadline<T>(
        &self,
        tier: &str,
        op: &str,
        fut: impl Future<Output = Result<T, TierError>>,
    ) -> Result<T, TierError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TierError::Unavailable(format!("{tier} {op} timed out"))),
        }
    }

    /// Writes an object: primary first, then the fallback as a mirror.
    ///
    /// - Primary ok, mirror ok → `Both`.
    /// - Primary ok, mirror failed → `Primary` (soft mirror), or
    ///   `PersistFailed` under `strict_mirror`.
    /// - Primary failed, fallback ok → `Fallback` (sole copy).
    /// - Both failed → `PersistFailed`; no metadata becomes visible.
    pub async fn put(&self, name: &str, size_hint: u64, bytes: &[u8]) -> Result<PutAck, StoreError> {
        validate_object_name(name)?;
        let size = bytes.len() as u64;
        tracing::debug!(name, size, size_hint, "tiered put");

        let primary_result = self
            .deadline(self.primary.label(), "put", self.primary.put(name, bytes))
            .await;

        match primary_result {
            Ok(()) => {
                let mirror_result = self
                    .deadline(self.fallback.label(), "put", self.fallback.put(name, bytes))
                    .await;
                match mirror_result {
                    Ok(()) => Ok(PutAck {
                        tier_of_record: TierOfRecord::Both,
                        size,
                    }),
                    Err(e) if self.strict_mirror => {
                        tracing::error!(name, error = %e, "mirror write failed under strict_mirror");
                        Err(StoreError::PersistFailed(name.to_string()))
                    }
                    Err(e) => {
                        tracing::warn!(
                            name,
                            error = %e,
                            "mirror write failed (soft mirror); primary copy stands alone"
                        );
                        Ok(PutAck {
                            tier_of_record: TierOfRecord::Primary,
                            size,
                        })
                    }
                }
            }
            Err(primary_err) => {
                tracing::warn!(
                    name,
                    error = %primary_err,
                    "primary put failed, writing sole copy to fallback"
                );
                let fallback_result = self
                    .deadline(self.fallback.label(), "put", self.fallback.put(name, bytes))
                    .await;
                match fallback_result {
                    Ok(()) => Ok(PutAck {
                        tier_of_record: TierOfRecord::Fallback,
                        size,
                    }),
                    Err(fallback_err) => {
                        tracing::error!(
                            name,
                            primary_error = %primary_err,
                            fallback_error = %fallback_err,
                            "put failed on both tiers"
                        );
                        Err(StoreError::PersistFailed(name.to_string()))
                    }
                }
            }
        }
    }

    /// Opens a read stream: primary first, fallback on *any* primary error.
    ///
    /// Both tiers failing collapses to `NotFound`: "never existed" and
    /// "not retrievable right now" are indistinguishable to the caller by
    /// design.
    pub async fn get(&self, name: &str) -> Result<ByteSource, StoreError> {
        validate_object_name(name)?;

        match self
            .deadline(self.primary.label(), "get", self.primary.get(name))
            .await
        {
            Ok(source) => Ok(source),
            Err(primary_err) => {
                tracing::debug!(name, error = %primary_err, "primary read failed, trying fallback");
                match self
                    .deadline(self.fallback.label(), "get", self.fallback.get(name))
                    .await
                {
                    Ok(source) => Ok(source),
                    Err(fallback_err) => {
                        tracing::debug!(name, error = %fallback_err, "fallback read failed too");
                        Err(StoreError::NotFound(name.to_string()))
                    }
                }
            }
        }
    }

    /// Stats an object with the same fallback order as [`get`](Self::get);
    /// the reported version and timestamp reflect whichever tier answered.
    pub async fn stat(&self, name: &str) -> Result<ObjectInfo, StoreError> {
        validate_object_name(name)?;

        let (stat, tier_of_record) = match self
            .deadline(self.primary.label(), "stat", self.primary.stat(name))
            .await
        {
            Ok(stat) => (stat, TierOfRecord::Primary),
            Err(primary_err) => {
                tracing::debug!(name, error = %primary_err, "primary stat failed, trying fallback");
                match self
                    .deadline(self.fallback.label(), "stat", self.fallback.stat(name))
                    .await
                {
                    Ok(stat) => (stat, TierOfRecord::Fallback),
                    Err(_) => return Err(StoreError::NotFound(name.to_string())),
                }
            }
        };

        Ok(ObjectInfo {
            name: name.to_string(),
            size: stat.size,
            last_modified: stat.last_modified,
            version: stat.version,
            tier_of_record,
        })
    }

    /// Deletes an object from both tiers independently.
    ///
    /// Succeeds if at least one tier removed it. Removing it from only one
    /// tier is a tolerated transient inconsistency: a later get still
    /// serves the survivor, and a delete retry cleans up the remainder.
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome, StoreError> {
        validate_object_name(name)?;

        let (primary_result, fallback_result) = tokio::join!(
            self.deadline(self.primary.label(), "delete", self.primary.delete(name)),
            self.deadline(self.fallback.label(), "delete", self.fallback.delete(name)),
        );

        let outcome = DeleteOutcome {
            primary: primary_result.is_ok(),
            fallback: fallback_result.is_ok(),
        };

        if let Err(e) = &primary_result {
            tracing::debug!(name, error = %e, "primary delete did not remove the object");
        }
        if let Err(e) = &fallback_result {
            tracing::debug!(name, error = %e, "fallback delete did not remove the object");
        }

        if outcome.primary || outcome.fallback {
            tracing::debug!(name, ?outcome, "tiered delete");
            Ok(outcome)
        } else {
            Err(StoreError::NotFound(name.to_string()))
        }
    }
}
