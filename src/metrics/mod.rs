//! Metrics and monitoring for the party queue service
//!
//! Prometheus collection plus the HTTP health and metrics endpoints.

pub mod collector;
pub mod health;

pub use collector::{GroupMetrics, MetricsCollector, MetricsTimer, QueueMetrics, ServiceMetrics};
pub use health::{render_metrics, HealthServer, HealthServerConfig};
