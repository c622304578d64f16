//! Matchmaking queue
//!
//! Party leaders queue for a fixed match size. Every arrival triggers a
//! drain through the `DrainGate`: the oldest queued parties are read from the
//! ordered store, an exact-size combination is searched for and the chosen
//! parties are promoted into one started match.
//!
//! The local index (participant -> entry) is authoritative. It only changes
//! after the matching store call succeeds, and store keys without a live
//! index entry are treated as orphans.

use crate::config::QueueSettings;
use crate::error::Result;
use crate::events::GroupEventPublisher;
use crate::group::matches::MatchMembershipService;
use crate::group::party::PartyQueryService;
use crate::metrics::MetricsCollector;
use crate::queue::assigner::{Candidate, SubsetAssigner};
use crate::queue::scheduler::{DrainGate, GateScope};
use crate::queue::store::{OrderedStore, QueueStores};
use crate::types::{MatchFormed, ParticipantId, QueueSize};
use crate::utils;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Queue tuning
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// Oldest entries read per drain
    pub buffer_size: usize,
    pub entry_ttl: Duration,
    pub drain_cooldown: Duration,
    pub gate_scope: GateScope,
}

impl From<&QueueSettings> for QueueOptions {
    fn from(settings: &QueueSettings) -> Self {
        Self {
            buffer_size: settings.buffer_size,
            entry_ttl: Duration::from_secs(settings.entry_ttl_seconds),
            drain_cooldown: Duration::from_millis(settings.drain_cooldown_ms),
            gate_scope: settings.gate_scope,
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::from(&QueueSettings::default())
    }
}

#[derive(Debug, Clone)]
struct QueuedEntry {
    size: QueueSize,
    key: String,
    expires_at: Instant,
}

impl QueuedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Result of one drain
#[derive(Debug, Clone)]
pub enum DrainOutcome {
    /// Parties were promoted into a started match
    Formed(MatchFormed),
    /// Nothing queued, or no combination fills the target size
    NoMatch,
    /// The store range read failed
    StoreFailed,
    /// A combination was found but the match could not be set up
    Aborted,
}

impl DrainOutcome {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainOutcome::Formed(_) => "formed",
            DrainOutcome::NoMatch => "no_match",
            DrainOutcome::StoreFailed => "store_failed",
            DrainOutcome::Aborted => "aborted",
        }
    }

    pub fn formed(&self) -> Option<&MatchFormed> {
        match self {
            DrainOutcome::Formed(event) => Some(event),
            _ => None,
        }
    }
}

/// Matchmaking queue over one ordered store per size
pub struct MatchmakingQueue {
    stores: QueueStores,
    index: Mutex<HashMap<ParticipantId, QueuedEntry>>,
    parties: Arc<dyn PartyQueryService>,
    matches: Arc<MatchMembershipService>,
    publisher: Arc<dyn GroupEventPublisher>,
    metrics: Arc<MetricsCollector>,
    gate: DrainGate,
    assigner: SubsetAssigner,
    options: QueueOptions,
}

impl MatchmakingQueue {
    pub fn new(
        options: QueueOptions,
        stores: QueueStores,
        parties: Arc<dyn PartyQueryService>,
        matches: Arc<MatchMembershipService>,
        publisher: Arc<dyn GroupEventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            stores,
            index: Mutex::new(HashMap::new()),
            parties,
            matches,
            publisher,
            metrics,
            gate: DrainGate::new(options.gate_scope, options.drain_cooldown),
            assigner: SubsetAssigner::new(),
            options,
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn gate(&self) -> &DrainGate {
        &self.gate
    }

    /// Ordered store backing the `size` queue
    pub fn store(&self, size: QueueSize) -> &Arc<dyn OrderedStore> {
        self.stores.get(size)
    }

    /// Queue `participant`'s party for a match of `size`, then try a drain.
    ///
    /// Rejected with `false` unless the participant leads a party and has no
    /// live entry in any queue.
    pub async fn enqueue(&self, participant: ParticipantId, size: QueueSize) -> Result<bool> {
        if !self.parties.is_leader(participant) {
            debug!("Enqueue of {} rejected: not a party leader", participant);
            return Ok(false);
        }

        {
            let mut index = self.index.lock().await;
            let now = Instant::now();
            if let Some(entry) = index.get(&participant) {
                if !entry.is_expired(now) {
                    debug!(
                        "Enqueue of {} rejected: already queued for {}",
                        participant, entry.size
                    );
                    return Ok(false);
                }
            }

            let key = utils::queue_key(utils::current_timestamp(), participant);
            if let Err(e) = self
                .stores
                .get(size)
                .put(&key, participant, self.options.entry_ttl)
                .await
            {
                self.metrics.record_store_error("put");
                warn!("Failed to queue {} for {}: {}", participant, size, e);
                return Err(e);
            }

            index.insert(
                participant,
                QueuedEntry {
                    size,
                    key,
                    expires_at: now + self.options.entry_ttl,
                },
            );
            self.refresh_waiting(&index);
        }

        self.metrics.record_enqueue(size);
        info!("{} queued for a match of {}", participant, size);

        self.trigger_drain(size).await;
        Ok(true)
    }

    /// Remove `participant`'s queue entry. `false` if they were not queued.
    pub async fn dequeue(&self, participant: ParticipantId) -> Result<bool> {
        let mut index = self.index.lock().await;
        let Some(entry) = index.get(&participant).cloned() else {
            return Ok(false);
        };

        if let Err(e) = self.stores.get(entry.size).remove(&entry.key).await {
            self.metrics.record_store_error("remove");
            warn!("Failed to dequeue {} from {}: {}", participant, entry.size, e);
            return Err(e);
        }

        index.remove(&participant);
        self.refresh_waiting(&index);
        drop(index);

        self.metrics.record_dequeue(entry.size);
        debug!("{} left the queue for {}", participant, entry.size);
        Ok(true)
    }

    /// Size `participant` is queued for, ignoring expired entries
    pub async fn queued_size(&self, participant: ParticipantId) -> Option<QueueSize> {
        let index = self.index.lock().await;
        index
            .get(&participant)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.size)
    }

    /// Live queue entries across all sizes
    pub async fn queued_count(&self) -> usize {
        let index = self.index.lock().await;
        let now = Instant::now();
        index.values().filter(|entry| !entry.is_expired(now)).count()
    }

    /// Drain `size` if the gate allows it. `None` when the gate is closed.
    pub async fn trigger_drain(&self, size: QueueSize) -> Option<DrainOutcome> {
        let permit = self.gate.try_acquire(size)?;
        let outcome = self.drain(size).await;
        permit.cool_down();
        Some(outcome)
    }

    /// Run one drain of `size` now, bypassing the gate
    pub async fn drain(&self, size: QueueSize) -> DrainOutcome {
        let timer = self.metrics.start_timer();
        let outcome = self.run_drain(size).await;
        self.metrics.record_drain(size, outcome.as_str(), timer.stop());
        outcome
    }

    async fn run_drain(&self, size: QueueSize) -> DrainOutcome {
        let entries = match self
            .stores
            .get(size)
            .range_ascending(self.options.buffer_size)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                self.metrics.record_store_error("range");
                warn!("Drain of {} aborted, range read failed: {}", size, e);
                return DrainOutcome::StoreFailed;
            }
        };
        if entries.is_empty() {
            return DrainOutcome::NoMatch;
        }

        let candidates = self.resolve_candidates(size, entries).await;

        let timer = self.metrics.start_timer();
        let chosen = self.assigner.assign(&candidates, size.target());
        self.metrics.record_assignment(timer.stop());

        match chosen {
            Some(leaders) => self.promote(size, leaders).await,
            None => {
                debug!(
                    "No combination of {} queued part(ies) fills a match of {}",
                    candidates.len(),
                    size
                );
                DrainOutcome::NoMatch
            }
        }
    }

    /// Live party sizes for the scanned entries.
    ///
    /// Orphaned keys are deleted from the store and leaders who no longer
    /// lead a party are dequeued; neither reaches the search.
    async fn resolve_candidates(
        &self,
        size: QueueSize,
        entries: Vec<(String, ParticipantId)>,
    ) -> Vec<Candidate> {
        let live: HashMap<ParticipantId, String> = {
            let index = self.index.lock().await;
            let now = Instant::now();
            index
                .iter()
                .filter(|(_, entry)| entry.size == size && !entry.is_expired(now))
                .map(|(participant, entry)| (*participant, entry.key.clone()))
                .collect()
        };

        let mut candidates = Vec::with_capacity(entries.len());
        let mut orphans = Vec::new();
        let mut stale = Vec::new();

        for (key, leader) in entries {
            if live.get(&leader) != Some(&key) {
                orphans.push(key);
                continue;
            }
            let party_size = if self.parties.is_leader(leader) {
                self.parties.get_players(leader).len()
            } else {
                0
            };
            if party_size == 0 {
                stale.push(leader);
                continue;
            }
            candidates.push(Candidate::new(leader, party_size));
        }

        let store = self.stores.get(size);
        for key in orphans {
            match store.remove(&key).await {
                Ok(()) => debug!("Removed orphaned queue key {}", key),
                Err(e) => {
                    self.metrics.record_store_error("remove");
                    debug!("Failed to remove orphaned queue key {}: {}", key, e);
                }
            }
        }
        for leader in stale {
            match self.dequeue(leader).await {
                Ok(_) => debug!("Dropped stale queue entry of {}", leader),
                Err(e) => debug!("Failed to drop stale queue entry of {}: {}", leader, e),
            }
        }

        candidates
    }

    /// Move the chosen parties into one started match led by the first
    /// leader. Parties that vanish mid-way are skipped. The first leader
    /// keeps their queue entry if their match cannot be set up.
    async fn promote(&self, size: QueueSize, leaders: Vec<ParticipantId>) -> DrainOutcome {
        let Some((&leader, others)) = leaders.split_first() else {
            return DrainOutcome::NoMatch;
        };

        match self.matches.create(leader) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Promotion aborted: {} already belongs to an open match", leader);
                return DrainOutcome::Aborted;
            }
            Err(e) => {
                error!("Promotion aborted: match creation for {} failed: {}", leader, e);
                return DrainOutcome::Aborted;
            }
        }

        // The fresh match is disbanded if the leader's entry cannot be consumed
        let dequeued = match self.dequeue(leader).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Promotion aborted: {} is no longer queued", leader);
                false
            }
            Err(e) => {
                warn!("Promotion aborted: could not dequeue {}: {}", leader, e);
                false
            }
        };
        if !dequeued {
            if let Err(e) = self.matches.leave(leader) {
                error!("Failed to disband the unused match of {}: {}", leader, e);
            }
            return DrainOutcome::Aborted;
        }

        let mut party_leaders = vec![leader];
        for &other in others {
            match self.dequeue(other).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Skipping {}: no longer queued", other);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", other, e);
                    continue;
                }
            }
            match self.matches.join(other, leader) {
                Ok(true) => party_leaders.push(other),
                Ok(false) => warn!("Skipping {}: party could not join the match of {}", other, leader),
                Err(e) => warn!("Skipping {}: join failed: {}", other, e),
            }
        }

        match self.matches.start_match(leader) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Match of {} could not be started", leader);
                return DrainOutcome::Aborted;
            }
            Err(e) => {
                error!("Starting the match of {} failed: {}", leader, e);
                return DrainOutcome::Aborted;
            }
        }

        let members = match self.matches.get_group(leader) {
            Ok(Some(game)) => game.members,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to read the match of {}: {}", leader, e);
                Vec::new()
            }
        };
        let under_filled = members.len() < size.target();

        let event = MatchFormed {
            match_id: utils::generate_match_id(),
            leader,
            party_leaders,
            members,
            target_size: size,
            under_filled,
            formed_at: utils::current_timestamp(),
        };

        self.metrics.record_match_formed(size, under_filled);
        if under_filled {
            warn!(
                "Match {} of {} started under-filled with {} member(s)",
                event.match_id,
                size,
                event.members.len()
            );
        } else {
            info!(
                "Match {} of {} formed, led by {}",
                event.match_id, size, leader
            );
        }

        if let Err(e) = self.publisher.publish_match_formed(event.clone()).await {
            warn!("Failed to publish MatchFormed for {}: {}", event.match_id, e);
        }

        DrainOutcome::Formed(event)
    }

    /// Drop expired index entries and ask the stores to purge theirs.
    /// Returns how many index entries were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let removed = {
            let mut index = self.index.lock().await;
            let now = Instant::now();
            let before = index.len();
            index.retain(|_, entry| !entry.is_expired(now));
            self.refresh_waiting(&index);
            before - index.len()
        };

        for size in QueueSize::ALL {
            if let Err(e) = self.stores.get(size).purge_expired().await {
                self.metrics.record_store_error("purge");
                warn!("Failed to purge expired entries of {}: {}", size, e);
            }
        }

        if removed > 0 {
            info!("Swept {} expired queue entr(ies)", removed);
        }
        removed
    }

    fn refresh_waiting(&self, index: &HashMap<ParticipantId, QueuedEntry>) {
        for size in QueueSize::ALL {
            let waiting = index.values().filter(|entry| entry.size == size).count();
            self.metrics.set_parties_waiting(size, waiting);
        }
    }
}
