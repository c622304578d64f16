//! Utility functions for the matchmaking service

use crate::types::{MatchId, ParticipantId};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> MatchId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Build the ordered-store key for a queue entry.
///
/// Milliseconds are zero padded so lexical order follows time order; the
/// participant id suffix keeps keys unique when two leaders join in the
/// same millisecond.
pub fn queue_key(at: DateTime<Utc>, participant: ParticipantId) -> String {
    format!("{:015}:{}", at.timestamp_millis().max(0), participant)
}

/// Atomic "operation in flight" flag.
///
/// `try_begin` hands out at most one guard at a time; re-entrant triggers
/// while a guard is alive get `None`.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag, or `None` if another operation holds it
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears its `InFlight` flag when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
