//! Ordered-set storage for the ranking.
//!
//! `RankingStore` is the seam between the leaderboard policy and the backing
//! store. `RedisRankingStore` is the production variant over Redis sorted sets;
//! `InMemoryRankingStore` mirrors its semantics for tests and local runs.
//!
//! ## Key layout
//!
//! ```text
//! {namespace}:{key}   → sorted set of member → score (expires after the TTL)
//! ```
//!
//! Tie-breaking among equal scores follows Redis `ZREVRANGE`: members with
//! the same score come back in reverse lexicographic order. Other stores are
//! not required to match this.

pub mod connection;
pub mod errors;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::models::ScoreEntry;

pub use connection::{create_pool, health_check, with_retry};
pub use errors::{Result, StoreError};
pub use memory::InMemoryRankingStore;
pub use self::redis::RedisRankingStore;

/// Outcome of a key existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPresence {
    Present(i64),
    Absent,
    /// The probe itself failed; the key may or may not exist.
    CheckFailed(String),
}

impl KeyPresence {
    /// Integer view of the probe: positive when present, `0` otherwise.
    ///
    /// Absence and a failed check both collapse to `0` here; callers that
    /// need to tell them apart should match on the variant instead.
    pub fn count(&self) -> i64 {
        match self {
            KeyPresence::Present(count) => *count,
            KeyPresence::Absent | KeyPresence::CheckFailed(_) => 0,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, KeyPresence::Present(_))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Insert `entry.identity` with `entry.value` as its score. An existing
    /// member with the same string has its score overwritten.
    async fn create(&self, key: &str, entry: &ScoreEntry) -> Result<()>;

    /// Entries sorted by score descending between the inclusive rank indices
    /// `offset` and `limit`. A missing key yields an empty list.
    async fn list(&self, key: &str, offset: i64, limit: i64) -> Result<Vec<ScoreEntry>>;

    /// Probe whether the collection exists. Never fails; transport errors are
    /// reported as `KeyPresence::CheckFailed`.
    async fn exists(&self, key: &str) -> KeyPresence;

    /// Arm a time-to-live on the whole collection.
    async fn set_expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Remove every key in this store's namespace, returning how many were
    /// removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Cheap liveness probe against the backing service.
    async fn ping(&self) -> Result<()>;
}
