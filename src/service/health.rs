//! Health check endpoints and monitoring
//!
//! Readiness and liveness checks plus a component breakdown for the party
//! queue service.

use crate::service::app::AppState;
use crate::types::QueueSize;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value (0=unhealthy, 1=degraded, 2=healthy)
    pub fn as_gauge(&self) -> i64 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: &HealthStatus) -> HealthStatus {
        match (&self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_parties: usize,
    pub active_matches: usize,
    /// Live queue entries across all sizes
    pub queued_parties: usize,
    /// Matches formed by the queue since service start
    pub matches_formed: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();

        checks.push(Self::check_service_running(&app_state).await);
        checks.push(Self::check_memberships(&app_state));
        for size in QueueSize::ALL {
            checks.push(Self::check_queue_store(&app_state, size).await);
        }

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |status, check| status.worst(&check.status));
        app_state.metrics().update_health_status(status.as_gauge());
        for check in &checks {
            app_state
                .metrics()
                .update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
        }

        let stats = match app_state.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                debug!("Failed to gather stats for health check: {}", e);
                ServiceStats::default()
            }
        };

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let mut status = Self::check_memberships(&app_state).status;
        for size in QueueSize::ALL {
            status = status.worst(&Self::check_queue_store(&app_state, size).await.status);
        }
        Ok(status)
    }

    /// Check if service is running
    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Membership state is unusable once a lock is poisoned
    fn check_memberships(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let result = app_state
            .parties()
            .party_count()
            .and_then(|_| app_state.matches().match_count());
        let (status, message) = match result {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Membership state check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "memberships".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A failing store only degrades the service: groups keep working
    async fn check_queue_store(app_state: &AppState, size: QueueSize) -> ComponentCheck {
        let start = std::time::Instant::now();

        let queue = app_state.queue();
        let (status, message) = match queue.store(size).range_ascending(1).await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Degraded,
                Some(format!("Range read failed: {}", e)),
            ),
        };

        ComponentCheck {
            name: size.store_name().to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let app = Arc::new(AppState::new(AppConfig::default()).unwrap());

        let health = HealthCheck::check(app.clone()).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.service, "party-queue");
        assert_eq!(health.checks.len(), 4);

        assert_eq!(
            HealthCheck::liveness_check(app.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(app).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_health_check_reports_stats() {
        let app = Arc::new(AppState::new(AppConfig::default()).unwrap());
        app.api().connect(1);
        app.api().connect(2);

        let health = HealthCheck::check(app).await.unwrap();
        assert_eq!(health.stats.active_parties, 2);

        let json = health.to_json().unwrap();
        assert!(json.contains("\"memberships\""));
        assert!(json.contains("\"MatchQueue4\""));
    }

    #[test]
    fn test_worst_status_wins() {
        assert_eq!(
            HealthStatus::Healthy.worst(&HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(&HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(HealthStatus::Unhealthy.as_gauge(), 0);
    }
}
