//! Configuration management for the party queue service
//!
//! Configuration comes from defaults, an optional TOML file and environment
//! variables, and is validated before use.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, QueueSettings, ServiceSettings};
