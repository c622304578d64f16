//! Error types for the party and matchmaking service
//!
//! Expected rejections (unauthorized caller, wrong password, already queued)
//! are plain `false` results. The errors here cover the unexpected cases:
//! ordered-store failures, poisoned state and bad configuration.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Ordered store {operation} failed: {message}")]
    StoreUnavailable { operation: String, message: String },

    #[error("Unknown queue size: {size}")]
    UnknownQueueSize { size: usize },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Shorthand for a store failure on `operation`
    pub fn store(operation: &str, message: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a poisoned lock on the named state
    pub fn poisoned(what: &str) -> Self {
        Self::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
