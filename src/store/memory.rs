use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::ScoreEntry;
use crate::store::errors::{Result, StoreError};
use crate::store::{KeyPresence, RankingStore};

#[derive(Debug, Default)]
struct SortedSet {
    members: HashMap<String, f64>,
    expires_at: Option<Instant>,
}

impl SortedSet {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process `RankingStore` with the same ordering, pagination and expiry
/// semantics as the Redis variant.
///
/// Expiry is evaluated lazily on access against `tokio::time::Instant`.
#[derive(Debug, Default)]
pub struct InMemoryRankingStore {
    sets: RwLock<HashMap<String, SortedSet>>,
}

impl InMemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let sets = self.sets.read().await;
        sets.values().filter(|set| !set.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining time-to-live of `key`, if it exists and has one.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let sets = self.sets.read().await;
        sets.get(key)
            .filter(|set| !set.is_expired(now))
            .and_then(|set| set.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

fn purge_if_expired(sets: &mut HashMap<String, SortedSet>, key: &str, now: Instant) {
    if sets.get(key).is_some_and(|set| set.is_expired(now)) {
        sets.remove(key);
    }
}

/// Clamp Redis-style inclusive `start..=stop` indices (negative values count
/// from the end) to a slice range over `len` elements.
fn rank_range(start: i64, stop: i64, len: usize) -> Option<std::ops::Range<usize>> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }

    Some(start as usize..stop as usize + 1)
}

#[async_trait]
impl RankingStore for InMemoryRankingStore {
    async fn create(&self, key: &str, entry: &ScoreEntry) -> Result<()> {
        if !entry.value.is_finite() {
            return Err(StoreError::InvalidData(format!(
                "score must be finite, got {}",
                entry.value
            )));
        }

        let now = Instant::now();
        let mut sets = self.sets.write().await;
        purge_if_expired(&mut sets, key, now);

        sets.entry(key.to_string())
            .or_default()
            .members
            .insert(entry.identity.clone(), entry.value);

        Ok(())
    }

    async fn list(&self, key: &str, offset: i64, limit: i64) -> Result<Vec<ScoreEntry>> {
        let now = Instant::now();
        let sets = self.sets.read().await;

        let set = match sets.get(key) {
            Some(set) if !set.is_expired(now) => set,
            _ => return Ok(Vec::new()),
        };

        let mut ranked: Vec<(&String, f64)> =
            set.members.iter().map(|(member, score)| (member, *score)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));

        let range = match rank_range(offset, limit, ranked.len()) {
            Some(range) => range,
            None => return Ok(Vec::new()),
        };

        Ok(ranked[range]
            .iter()
            .map(|(member, score)| ScoreEntry::new(member.as_str(), *score))
            .collect())
    }

    async fn exists(&self, key: &str) -> KeyPresence {
        let now = Instant::now();
        let sets = self.sets.read().await;

        match sets.get(key) {
            Some(set) if !set.is_expired(now) => KeyPresence::Present(1),
            _ => KeyPresence::Absent,
        }
    }

    async fn set_expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut sets = self.sets.write().await;
        purge_if_expired(&mut sets, key, now);

        match sets.get_mut(key) {
            Some(set) => {
                set.expires_at = Some(now + ttl.max(Duration::from_secs(1)));
                Ok(())
            }
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    async fn delete_all(&self) -> Result<u64> {
        let now = Instant::now();
        let mut sets = self.sets.write().await;
        let removed = sets.values().filter(|set| !set.is_expired(now)).count() as u64;
        sets.clear();
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "leaderboard";

    async fn seeded(entries: &[(&str, f64)]) -> InMemoryRankingStore {
        let store = InMemoryRankingStore::new();
        for (member, score) in entries {
            store.create(KEY, &ScoreEntry::new(*member, *score)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_list_orders_by_score_descending() {
        let store = seeded(&[("b", 30.0), ("a", 40.0)]).await;

        let result = store.list(KEY, 0, 9).await.unwrap();

        assert_eq!(result, vec![ScoreEntry::new("a", 40.0), ScoreEntry::new("b", 30.0)]);
    }

    #[tokio::test]
    async fn test_create_overwrites_existing_member() {
        let store = seeded(&[("adam", 10.2), ("adam", 3.5)]).await;

        let result = store.list(KEY, 0, 9).await.unwrap();

        assert_eq!(result, vec![ScoreEntry::new("adam", 3.5)]);
    }

    #[tokio::test]
    async fn test_ties_use_reverse_lexicographic_member_order() {
        let store = seeded(&[("alice", 5.0), ("carol", 5.0), ("bob", 5.0)]).await;

        let members: Vec<String> = store
            .list(KEY, 0, -1)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.identity)
            .collect();

        assert_eq!(members, vec!["carol", "bob", "alice"]);
    }

    #[tokio::test]
    async fn test_list_pagination_is_inclusive() {
        let entries: Vec<(String, f64)> =
            (0..15).map(|i| (format!("player{:02}", i), i as f64)).collect();
        let store = InMemoryRankingStore::new();
        for (member, score) in &entries {
            store.create(KEY, &ScoreEntry::new(member.as_str(), *score)).await.unwrap();
        }

        let top = store.list(KEY, 0, 9).await.unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].identity, "player14");
        assert_eq!(top[9].identity, "player05");

        let tail = store.list(KEY, 10, 100).await.unwrap();
        assert_eq!(tail.len(), 5);

        assert!(store.list(KEY, 20, 30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_key_is_empty() {
        let store = InMemoryRankingStore::new();

        assert!(store.list(KEY, 0, 9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exists_tracks_key_lifetime() {
        let store = InMemoryRankingStore::new();
        assert_eq!(store.exists(KEY).await, KeyPresence::Absent);

        store.create(KEY, &ScoreEntry::new("adam", 1.0)).await.unwrap();
        assert_eq!(store.exists(KEY).await.count(), 1);

        store.delete_all().await.unwrap();
        assert_eq!(store.exists(KEY).await, KeyPresence::Absent);
    }

    #[tokio::test]
    async fn test_set_expire_requires_existing_key() {
        let store = InMemoryRankingStore::new();

        let result = store.set_expire(KEY, Duration::from_secs(600)).await;

        assert!(matches!(result, Err(StoreError::KeyNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_expires_after_ttl() {
        let store = seeded(&[("adam", 10.2)]).await;
        store.set_expire(KEY, Duration::from_secs(600)).await.unwrap();

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(store.exists(KEY).await.is_present());
        assert_eq!(store.ttl(KEY).await, Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.exists(KEY).await, KeyPresence::Absent);
        assert!(store.list(KEY, 0, 9).await.unwrap().is_empty());

        // A fresh insert starts a new lifetime without a TTL.
        store.create(KEY, &ScoreEntry::new("peter", 91.2)).await.unwrap();
        assert_eq!(store.ttl(KEY).await, None);
        assert_eq!(store.list(KEY, 0, 9).await.unwrap(), vec![ScoreEntry::new("peter", 91.2)]);
    }

    #[tokio::test]
    async fn test_delete_all_reports_removed_keys() {
        let store = seeded(&[("adam", 1.0)]).await;
        store.create("other", &ScoreEntry::new("x", 2.0)).await.unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_non_finite_score() {
        let store = InMemoryRankingStore::new();

        let result = store.create(KEY, &ScoreEntry::new("adam", f64::NAN)).await;

        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_rank_range() {
        assert_eq!(rank_range(0, 9, 3), Some(0..3));
        assert_eq!(rank_range(1, 1, 3), Some(1..2));
        assert_eq!(rank_range(0, -1, 3), Some(0..3));
        assert_eq!(rank_range(-2, -1, 3), Some(1..3));
        assert_eq!(rank_range(5, 9, 3), None);
        assert_eq!(rank_range(2, 1, 3), None);
        assert_eq!(rank_range(0, 9, 0), None);
    }
}
