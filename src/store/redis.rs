use async_trait::async_trait;
use deadpool_redis::redis::{self, FromRedisValue};
use deadpool_redis::{Connection, Pool};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{LeaderboardConfig, RedisConfig};
use crate::models::ScoreEntry;
use crate::store::connection::with_retry;
use crate::store::errors::{Result, StoreError};
use crate::store::{KeyPresence, RankingStore};

/// Number of keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

/// `RankingStore` over Redis sorted sets.
///
/// Every key is prefixed with the configured namespace so that
/// `delete_all` never touches data it does not own.
#[derive(Clone)]
pub struct RedisRankingStore {
    pool: Pool,
    namespace: String,
    max_retries: u8,
    command_timeout: Duration,
}

impl RedisRankingStore {
    pub fn new(pool: Pool, redis: &RedisConfig, board: &LeaderboardConfig) -> Self {
        Self {
            pool,
            namespace: board.namespace.clone(),
            max_retries: redis.max_retries,
            command_timeout: redis.command_timeout,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn physical_key(&self, key: &str) -> String {
        namespaced_key(&self.namespace, key)
    }

    async fn connection(&self) -> Result<Connection> {
        let pool = &self.pool;
        with_retry(self.max_retries, || async move {
            pool.get().await.map_err(StoreError::from)
        })
        .await
    }

    /// Run a command future under the per-command timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout {
                millis: self.command_timeout.as_millis() as u64,
            }),
        }
    }

    async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T> {
        let mut conn = self.connection().await?;
        self.bounded(cmd.query_async(&mut conn)).await
    }
}

#[async_trait]
impl RankingStore for RedisRankingStore {
    #[tracing::instrument(skip(self, entry), fields(member = %entry.identity, score = entry.value))]
    async fn create(&self, key: &str, entry: &ScoreEntry) -> Result<()> {
        if !entry.value.is_finite() {
            return Err(StoreError::InvalidData(format!(
                "score must be finite, got {}",
                entry.value
            )));
        }

        let mut cmd = redis::cmd("ZADD");
        cmd.arg(self.physical_key(key))
            .arg(entry.value)
            .arg(&entry.identity);

        let added: i64 = self.query(&cmd).await?;
        debug!(added, "Member upserted");

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, key: &str, offset: i64, limit: i64) -> Result<Vec<ScoreEntry>> {
        let mut cmd = redis::cmd("ZREVRANGE");
        cmd.arg(self.physical_key(key))
            .arg(offset)
            .arg(limit)
            .arg("WITHSCORES");

        let members: Vec<(String, f64)> = self.query(&cmd).await?;

        Ok(members
            .into_iter()
            .map(|(member, score)| ScoreEntry::new(member, score))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> KeyPresence {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(self.physical_key(key));

        match self.query::<i64>(&cmd).await {
            Ok(count) if count > 0 => KeyPresence::Present(count),
            Ok(_) => KeyPresence::Absent,
            Err(e) => {
                warn!(error = %e, "Key existence check failed");
                KeyPresence::CheckFailed(e.to_string())
            }
        }
    }

    #[tracing::instrument(skip(self), fields(ttl_secs = ttl.as_secs()))]
    async fn set_expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let physical = self.physical_key(key);

        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(&physical).arg(ttl.as_secs().max(1));

        let armed: i64 = self.query(&cmd).await?;
        if armed == 0 {
            return Err(StoreError::KeyNotFound(physical));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(namespace = %self.namespace))]
    async fn delete_all(&self) -> Result<u64> {
        let pattern = scan_pattern(&self.namespace);
        let mut conn = self.connection().await?;

        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH);

            let (next, keys): (u64, Vec<String>) =
                self.bounded(scan.query_async(&mut conn)).await?;

            if !keys.is_empty() {
                let mut del = redis::cmd("DEL");
                del.arg(&keys);
                let count: u64 = self.bounded(del.query_async(&mut conn)).await?;
                removed += count;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(removed, "Namespace cleared");
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        let reply: String = self.query(&redis::cmd("PING")).await?;
        if reply != "PONG" {
            return Err(StoreError::InvalidData(format!(
                "Unexpected PING reply: {}",
                reply
            )));
        }
        Ok(())
    }
}

/// Physical key of `key` inside `namespace`. An empty namespace leaves the
/// key untouched.
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

/// `SCAN MATCH` pattern covering every key of `namespace`.
///
/// Glob metacharacters in the namespace are escaped so they match literally.
/// An empty namespace matches the whole database.
pub fn scan_pattern(namespace: &str) -> String {
    if namespace.is_empty() {
        return "*".to_string();
    }

    let mut pattern = String::with_capacity(namespace.len() + 2);
    for c in namespace.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced_key("ranking", "leaderboard"), "ranking:leaderboard");
        assert_eq!(namespaced_key("", "leaderboard"), "leaderboard");
    }

    #[test]
    fn test_scan_pattern_is_scoped_to_namespace() {
        assert_eq!(scan_pattern("ranking"), "ranking:*");
    }

    #[test]
    fn test_scan_pattern_escapes_glob_characters() {
        assert_eq!(scan_pattern("team[1]*"), "team\\[1\\]\\*:*");
    }

    #[test]
    fn test_empty_namespace_scans_everything() {
        assert_eq!(scan_pattern(""), "*");
    }
}
