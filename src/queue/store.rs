//! Ordered key-value store backing the matchmaking queues
//!
//! Keys are queue keys from `utils::queue_key`, so ascending key order is
//! join order. Values are party leader ids. Every call may fail
//! transiently; callers only touch local state after a call succeeds.

use crate::error::{MatchmakingError, Result};
use crate::types::{ParticipantId, QueueSize};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Contract for an external ordered store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Write `key -> value`, expiring after `ttl`
    async fn put(&self, key: &str, value: ParticipantId, ttl: Duration) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Up to `limit` live entries in ascending key order
    async fn range_ascending(&self, limit: usize) -> Result<Vec<(String, ParticipantId)>>;

    /// Drop expired keys, returning how many were dropped. Stores that
    /// expire keys on their own can keep the default.
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: ParticipantId,
    expires_at: Instant,
}

/// In-process ordered store with TTL expiry
#[derive(Debug)]
pub struct InMemoryOrderedStore {
    name: String,
    entries: RwLock<BTreeMap<String, StoredEntry>>,
}

impl InMemoryOrderedStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored keys, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self, operation: &str) -> anyhow::Error {
        MatchmakingError::store(operation, format!("{} lock poisoned", self.name)).into()
    }
}

#[async_trait]
impl OrderedStore for InMemoryOrderedStore {
    async fn put(&self, key: &str, value: ParticipantId, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| self.poisoned("put"))?;
        entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| self.poisoned("remove"))?;
        entries.remove(key);
        Ok(())
    }

    async fn range_ascending(&self, limit: usize) -> Result<Vec<(String, ParticipantId)>> {
        let entries = self.entries.read().map_err(|_| self.poisoned("range"))?;
        let now = Instant::now();
        Ok(entries
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .take(limit)
            .map(|(key, entry)| (key.clone(), entry.value))
            .collect())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| self.poisoned("purge"))?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired entries from {}", purged, self.name);
        }
        Ok(purged)
    }
}

/// One ordered store per queue size
#[derive(Clone)]
pub struct QueueStores {
    duo: Arc<dyn OrderedStore>,
    squad: Arc<dyn OrderedStore>,
}

impl QueueStores {
    /// Build each size's store with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(QueueSize) -> Arc<dyn OrderedStore>,
    {
        Self {
            duo: factory(QueueSize::Duo),
            squad: factory(QueueSize::Squad),
        }
    }

    /// In-memory stores named after their queue
    pub fn in_memory() -> Self {
        Self::new(|size| Arc::new(InMemoryOrderedStore::new(size.store_name())))
    }

    pub fn get(&self, size: QueueSize) -> &Arc<dyn OrderedStore> {
        match size {
            QueueSize::Duo => &self.duo,
            QueueSize::Squad => &self.squad,
        }
    }
}

impl Default for QueueStores {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_is_ascending_and_bounded() {
        let store = InMemoryOrderedStore::new("MatchQueue4");
        let ttl = Duration::from_secs(60);

        store.put("000000000000003:7", 7, ttl).await.unwrap();
        store.put("000000000000001:9", 9, ttl).await.unwrap();
        store.put("000000000000002:8", 8, ttl).await.unwrap();

        let range = store.range_ascending(2).await.unwrap();
        assert_eq!(
            range,
            vec![
                ("000000000000001:9".to_string(), 9),
                ("000000000000002:8".to_string(), 8),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = InMemoryOrderedStore::new("MatchQueue2");
        store.put("a", 1, Duration::from_secs(60)).await.unwrap();

        tokio_test::assert_ok!(store.remove("a").await);
        tokio_test::assert_ok!(store.remove("a").await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_are_hidden_then_purged() {
        let store = InMemoryOrderedStore::new("MatchQueue2");
        store.put("a", 1, Duration::from_millis(10)).await.unwrap();
        store.put("b", 2, Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        let range = store.range_ascending(10).await.unwrap();
        assert_eq!(range, vec![("b".to_string(), 2)]);
        assert_eq!(store.len(), 2);

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_queue_stores_are_separate() {
        let stores = QueueStores::in_memory();
        let ttl = Duration::from_secs(60);

        stores.get(QueueSize::Duo).put("k", 1, ttl).await.unwrap();

        assert_eq!(stores.get(QueueSize::Duo).range_ascending(5).await.unwrap().len(), 1);
        assert!(stores
            .get(QueueSize::Squad)
            .range_ascending(5)
            .await
            .unwrap()
            .is_empty());
    }
}
