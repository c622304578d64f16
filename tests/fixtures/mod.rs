//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use party_queue::config::AppConfig;
use party_queue::error::{MatchmakingError, Result};
use party_queue::events::MockEventPublisher;
use party_queue::queue::{InMemoryOrderedStore, OrderedStore, QueueStores};
use party_queue::service::{AppState, GroupApi};
use party_queue::types::{GroupKind, ParticipantId, QueueSize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory store whose writes and deletes fail for chosen participants
#[derive(Debug)]
pub struct FlakyStore {
    inner: InMemoryOrderedStore,
    owners: Mutex<HashMap<String, ParticipantId>>,
    failing_puts: Mutex<HashSet<ParticipantId>>,
    failing_removes: Mutex<HashSet<ParticipantId>>,
}

impl FlakyStore {
    pub fn new(size: QueueSize) -> Self {
        Self {
            inner: InMemoryOrderedStore::new(size.store_name()),
            owners: Mutex::new(HashMap::new()),
            failing_puts: Mutex::new(HashSet::new()),
            failing_removes: Mutex::new(HashSet::new()),
        }
    }

    /// Fail every following `put` for `participant`
    pub fn fail_puts_for(&self, participant: ParticipantId) {
        self.failing_puts.lock().unwrap().insert(participant);
    }

    /// Fail every following `remove` of `participant`'s key
    pub fn fail_removes_for(&self, participant: ParticipantId) {
        self.failing_removes.lock().unwrap().insert(participant);
    }

    pub fn heal(&self) {
        self.failing_puts.lock().unwrap().clear();
        self.failing_removes.lock().unwrap().clear();
    }

    /// Participants with a key in the store
    pub fn stored_participants(&self) -> Vec<ParticipantId> {
        self.owners.lock().unwrap().values().copied().collect()
    }
}

#[async_trait]
impl OrderedStore for FlakyStore {
    async fn put(&self, key: &str, value: ParticipantId, ttl: Duration) -> Result<()> {
        if self.failing_puts.lock().unwrap().contains(&value) {
            return Err(MatchmakingError::store("put", "injected failure").into());
        }
        self.inner.put(key, value, ttl).await?;
        self.owners.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let owner = self.owners.lock().unwrap().get(key).copied();
        if let Some(owner) = owner {
            if self.failing_removes.lock().unwrap().contains(&owner) {
                return Err(MatchmakingError::store("remove", "injected failure").into());
            }
        }
        self.inner.remove(key).await?;
        self.owners.lock().unwrap().remove(key);
        Ok(())
    }

    async fn range_ascending(&self, limit: usize) -> Result<Vec<(String, ParticipantId)>> {
        self.inner.range_ascending(limit).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.inner.purge_expired().await
    }
}

/// A complete in-process service with inspectable collaborators
pub struct TestSystem {
    pub app: Arc<AppState>,
    pub api: GroupApi,
    pub publisher: Arc<MockEventPublisher>,
    pub duo_store: Arc<FlakyStore>,
    pub squad_store: Arc<FlakyStore>,
}

impl TestSystem {
    /// Drains run on every arrival
    pub fn new() -> Self {
        Self::with_cooldown(Duration::ZERO)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        let mut config = AppConfig::default();
        config.queue.drain_cooldown_ms = cooldown.as_millis() as u64;

        let duo_store = Arc::new(FlakyStore::new(QueueSize::Duo));
        let squad_store = Arc::new(FlakyStore::new(QueueSize::Squad));
        let stores = {
            let duo: Arc<dyn OrderedStore> = duo_store.clone();
            let squad: Arc<dyn OrderedStore> = squad_store.clone();
            QueueStores::new(move |size| match size {
                QueueSize::Duo => duo.clone(),
                QueueSize::Squad => squad.clone(),
            })
        };

        let publisher = Arc::new(MockEventPublisher::new());
        let app = Arc::new(
            AppState::with_components(config, stores, publisher.clone())
                .expect("test system should build"),
        );
        let api = app.api().clone();

        Self {
            app,
            api,
            publisher,
            duo_store,
            squad_store,
        }
    }

    /// Connect `leader` and `followers` and merge the followers into the
    /// leader's party
    pub fn party(&self, leader: ParticipantId, followers: &[ParticipantId]) {
        assert!(self.api.connect(leader), "connect {}", leader);
        for &follower in followers {
            assert!(self.api.connect(follower), "connect {}", follower);
            assert!(
                self.api
                    .request_join_group(GroupKind::Party, follower, leader, None),
                "{} joins party of {}",
                follower,
                leader
            );
        }
    }

    pub fn members(&self, kind: GroupKind, participant: ParticipantId) -> Vec<ParticipantId> {
        self.api
            .get_group(kind, participant)
            .map(|group| group.members)
            .unwrap_or_default()
    }
}

impl Default for TestSystem {
    fn default() -> Self {
        Self::new()
    }
}
