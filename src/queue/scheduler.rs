//! Drain rate limiting
//!
//! A drain claims the gate, runs once, then keeps the gate closed for a
//! cooldown. Arrivals during that window do not trigger another drain. The
//! gate is shared by every queue size unless configured per size.

use crate::types::QueueSize;
use crate::utils::{InFlight, InFlightGuard};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Which drains block each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateScope {
    /// One gate for every queue size
    #[default]
    Shared,
    /// One gate per queue size
    PerSize,
}

impl std::str::FromStr for GateScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(GateScope::Shared),
            "per_size" | "per-size" => Ok(GateScope::PerSize),
            other => Err(format!("Unknown drain gate scope: {}", other)),
        }
    }
}

impl std::fmt::Display for GateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateScope::Shared => write!(f, "shared"),
            GateScope::PerSize => write!(f, "per_size"),
        }
    }
}

/// Rate-limiting trigger for queue drains
#[derive(Debug, Clone)]
pub struct DrainGate {
    scope: GateScope,
    cooldown: Duration,
    shared: InFlight,
    duo: InFlight,
    squad: InFlight,
}

impl DrainGate {
    pub fn new(scope: GateScope, cooldown: Duration) -> Self {
        Self {
            scope,
            cooldown,
            shared: InFlight::new(),
            duo: InFlight::new(),
            squad: InFlight::new(),
        }
    }

    pub fn scope(&self) -> GateScope {
        self.scope
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn flag(&self, size: QueueSize) -> &InFlight {
        match (self.scope, size) {
            (GateScope::Shared, _) => &self.shared,
            (GateScope::PerSize, QueueSize::Duo) => &self.duo,
            (GateScope::PerSize, QueueSize::Squad) => &self.squad,
        }
    }

    /// Claim the gate for a drain of `size`, or `None` while it is busy or
    /// cooling down
    pub fn try_acquire(&self, size: QueueSize) -> Option<DrainPermit> {
        match self.flag(size).try_begin() {
            Some(guard) => Some(DrainPermit {
                guard,
                cooldown: self.cooldown,
            }),
            None => {
                debug!("Drain for size {} skipped: gate closed", size);
                None
            }
        }
    }

    pub fn is_closed(&self, size: QueueSize) -> bool {
        self.flag(size).is_busy()
    }
}

/// Held while a drain runs. Dropping it reopens the gate immediately.
#[derive(Debug)]
pub struct DrainPermit {
    guard: InFlightGuard,
    cooldown: Duration,
}

impl DrainPermit {
    /// Keep the gate closed for the cooldown, then reopen it.
    ///
    /// The wait runs on a spawned task so the caller is not held up.
    /// Outside a tokio runtime the gate reopens straight away.
    pub fn cool_down(self) {
        let DrainPermit { guard, cooldown } = self;
        if cooldown.is_zero() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(cooldown).await;
                    drop(guard);
                });
            }
            Err(_) => drop(guard),
        }
    }
}
