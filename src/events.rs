//! Outbound group events
//!
//! The network broadcast is external; this module defines the publishing
//! seam and the envelope events travel in.

use crate::error::{MatchmakingError, Result};
use crate::types::MatchFormed;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MATCH_FORMED_ROUTING_KEY: &str = "match.formed";

/// Event envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub routing_key: String,
}

impl<T> EventEnvelope<T>
where
    T: Serialize,
{
    pub fn new(payload: T, routing_key: &str) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            routing_key: routing_key.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize event: {}", e),
            }
            .into()
        })
    }
}

/// Trait for publishing group events
#[async_trait]
pub trait GroupEventPublisher: Send + Sync {
    /// Publish a MatchFormed event
    async fn publish_match_formed(&self, event: MatchFormed) -> Result<()>;
}

/// Publisher that writes events to the log
#[derive(Debug, Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GroupEventPublisher for TracingEventPublisher {
    async fn publish_match_formed(&self, event: MatchFormed) -> Result<()> {
        let envelope = EventEnvelope::new(event, MATCH_FORMED_ROUTING_KEY);
        info!(
            routing_key = %envelope.routing_key,
            "Publishing event: {}",
            envelope.to_json()?
        );
        Ok(())
    }
}

/// Publisher that records events in memory
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<MatchFormed>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<MatchFormed> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl GroupEventPublisher for MockEventPublisher {
    async fn publish_match_formed(&self, event: MatchFormed) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MatchmakingError::InternalError {
                message: "publisher unavailable".to_string(),
            }
            .into());
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
