//! Main application configuration
//!
//! Defaults, environment variable loading, TOML files and validation for the
//! party queue service.

use crate::queue::scheduler::GateScope;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Oldest entries read per drain
    pub buffer_size: usize,
    /// Lifetime of a queue entry that is never consumed
    pub entry_ttl_seconds: u64,
    /// Minimum spacing between drains
    pub drain_cooldown_ms: u64,
    /// Whether drains of different sizes share one gate
    pub gate_scope: GateScope,
    /// Expired entry sweep interval in seconds
    pub sweep_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "party-queue".to_string(),
            log_level: "info".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            buffer_size: 10,
            entry_ttl_seconds: 600, // 10 minutes
            drain_cooldown_ms: 1000,
            gate_scope: GateScope::Shared,
            sweep_interval_seconds: 30,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then let environment variables override it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse TOML without consulting the environment
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = parse_var("HTTP_PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Queue settings
        if let Ok(buffer) = env::var("QUEUE_BUFFER_SIZE") {
            self.queue.buffer_size = parse_var("QUEUE_BUFFER_SIZE", &buffer)?;
        }
        if let Ok(ttl) = env::var("QUEUE_ENTRY_TTL_SECONDS") {
            self.queue.entry_ttl_seconds = parse_var("QUEUE_ENTRY_TTL_SECONDS", &ttl)?;
        }
        if let Ok(cooldown) = env::var("DRAIN_COOLDOWN_MS") {
            self.queue.drain_cooldown_ms = parse_var("DRAIN_COOLDOWN_MS", &cooldown)?;
        }
        if let Ok(scope) = env::var("DRAIN_GATE_SCOPE") {
            self.queue.gate_scope = scope.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Ok(sweep) = env::var("QUEUE_SWEEP_INTERVAL_SECONDS") {
            self.queue.sweep_interval_seconds =
                parse_var("QUEUE_SWEEP_INTERVAL_SECONDS", &sweep)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get queue entry lifetime as Duration
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.queue.entry_ttl_seconds)
    }

    /// Get drain cooldown as Duration
    pub fn drain_cooldown(&self) -> Duration {
        Duration::from_millis(self.queue.drain_cooldown_ms)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.queue.sweep_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate queue settings
    if config.queue.buffer_size == 0 {
        return Err(anyhow!("Queue buffer size must be greater than 0"));
    }
    if config.queue.entry_ttl_seconds == 0 {
        return Err(anyhow!("Queue entry TTL must be greater than 0"));
    }
    if config.queue.sweep_interval_seconds == 0 {
        return Err(anyhow!("Sweep interval must be greater than 0"));
    }

    Ok(())
}
