//! Tiered storage backend for FileDepot.
//!
//! A [`TieredStore`] fans writes out to a primary [`StorageTier`] (HTTP
//! object store) with a local-disk fallback/mirror, and fans reads in from
//! the primary with automatic fallback. Tier errors never leave this crate
//! raw; the consistency engine translates every failure into a fallback
//! decision or a [`StoreError`].

mod local;
mod memory;
mod name;
mod object;
mod tier;
mod tiered;

pub use local::LocalDiskTier;
pub use memory::MemoryTier;
pub use name::validate_object_name;
pub use object::ObjectStoreTier;
pub use tier::{ByteSource, StorageTier, TierError, TierStat};
pub use tiered::{DeleteOutcome, PutAck, TieredStore};

use std::time::Duration;

/// Default deadline for one tier operation, after which it is treated as a
/// failure for fallback-decision purposes.
pub const DEFAULT_TIER_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the tiered store.
///
/// `NotFound` deliberately covers both "never existed" and "no tier can
/// serve it right now"; callers cannot distinguish the two.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid object name: {0}")]
    InvalidName(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("persist failed for {0}: no tier accepted the write")]
    PersistFailed(String),
}
