//! Metrics collection using Prometheus
//!
//! Group membership, queue and drain metrics for the party queue service.

use crate::types::{GroupKind, QueueSize};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the party queue service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Party and match membership metrics
    group_metrics: GroupMetrics,

    /// Matchmaking queue metrics
    queue_metrics: QueueMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Party and match membership metrics
#[derive(Clone)]
pub struct GroupMetrics {
    /// Active groups by kind
    pub active_groups: IntGaugeVec,

    /// Total groups created by kind
    pub groups_created_total: IntCounterVec,

    /// Join attempts by kind and result
    pub joins_total: IntCounterVec,

    /// Voluntary leaves by kind
    pub leaves_total: IntCounterVec,

    /// Kicks by kind
    pub kicks_total: IntCounterVec,

    /// Matches started
    pub matches_started_total: IntCounter,
}

/// Matchmaking queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Parties enqueued by target size
    pub enqueued_total: IntCounterVec,

    /// Parties removed from the queue by target size
    pub dequeued_total: IntCounterVec,

    /// Parties currently waiting by target size
    pub parties_waiting: IntGaugeVec,

    /// Drain attempts by target size and outcome
    pub drains_total: IntCounterVec,

    /// Matches formed by the queue, by target size
    pub matches_formed_total: IntCounterVec,

    /// Matches formed with fewer members than their target size
    pub under_filled_total: IntCounter,

    /// Time spent in one drain
    pub drain_duration: HistogramVec,

    /// Ordered store failures by operation
    pub store_errors_total: IntCounterVec,

    /// Subset search time
    pub assignment_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let group_metrics = GroupMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            group_metrics,
            queue_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get group metrics
    pub fn groups(&self) -> &GroupMetrics {
        &self.group_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn record_group_created(&self, kind: GroupKind) {
        self.group_metrics
            .groups_created_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn set_active_groups(&self, kind: GroupKind, count: usize) {
        self.group_metrics
            .active_groups
            .with_label_values(&[kind.as_str()])
            .set(count as i64);
    }

    pub fn record_join(&self, kind: GroupKind, joined: bool) {
        let result = if joined { "accepted" } else { "rejected" };
        self.group_metrics
            .joins_total
            .with_label_values(&[kind.as_str(), result])
            .inc();
    }

    pub fn record_leave(&self, kind: GroupKind) {
        self.group_metrics
            .leaves_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_kick(&self, kind: GroupKind) {
        self.group_metrics
            .kicks_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_match_started(&self) {
        self.group_metrics.matches_started_total.inc();
    }

    pub fn record_enqueue(&self, size: QueueSize) {
        self.queue_metrics
            .enqueued_total
            .with_label_values(&[size.store_name()])
            .inc();
    }

    pub fn record_dequeue(&self, size: QueueSize) {
        self.queue_metrics
            .dequeued_total
            .with_label_values(&[size.store_name()])
            .inc();
    }

    pub fn set_parties_waiting(&self, size: QueueSize, count: usize) {
        self.queue_metrics
            .parties_waiting
            .with_label_values(&[size.store_name()])
            .set(count as i64);
    }

    /// Record one finished drain
    pub fn record_drain(&self, size: QueueSize, outcome: &str, duration: Duration) {
        self.queue_metrics
            .drains_total
            .with_label_values(&[size.store_name(), outcome])
            .inc();
        self.queue_metrics
            .drain_duration
            .with_label_values(&[size.store_name()])
            .observe(duration.as_secs_f64());
    }

    pub fn record_match_formed(&self, size: QueueSize, under_filled: bool) {
        self.queue_metrics
            .matches_formed_total
            .with_label_values(&[size.store_name()])
            .inc();
        if under_filled {
            self.queue_metrics.under_filled_total.inc();
        }
    }

    pub fn record_store_error(&self, operation: &str) {
        self.queue_metrics
            .store_errors_total
            .with_label_values(&[operation])
            .inc();
    }

    pub fn record_assignment(&self, duration: Duration) {
        self.queue_metrics
            .assignment_duration
            .observe(duration.as_secs_f64());
    }

    /// Total matches formed across all queue sizes
    pub fn matches_formed(&self) -> u64 {
        QueueSize::ALL
            .iter()
            .map(|size| {
                self.queue_metrics
                    .matches_formed_total
                    .with_label_values(&[size.store_name()])
                    .get()
            })
            .sum()
    }

    /// Update health status
    pub fn update_health_status(&self, status: i64) {
        self.service_metrics.health_status.set(status);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(if healthy { 1 } else { 0 });
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("party_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "party_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("party_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl GroupMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_groups = IntGaugeVec::new(
            Opts::new("party_queue_active_groups", "Number of active groups"),
            &["kind"],
        )?;
        registry.register(Box::new(active_groups.clone()))?;

        let groups_created_total = IntCounterVec::new(
            Opts::new("party_queue_groups_created_total", "Total groups created"),
            &["kind"],
        )?;
        registry.register(Box::new(groups_created_total.clone()))?;

        let joins_total = IntCounterVec::new(
            Opts::new("party_queue_joins_total", "Group join attempts"),
            &["kind", "result"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total = IntCounterVec::new(
            Opts::new("party_queue_leaves_total", "Participants leaving a group"),
            &["kind"],
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let kicks_total = IntCounterVec::new(
            Opts::new("party_queue_kicks_total", "Participants kicked from a group"),
            &["kind"],
        )?;
        registry.register(Box::new(kicks_total.clone()))?;

        let matches_started_total =
            IntCounter::new("party_queue_matches_started_total", "Total matches started")?;
        registry.register(Box::new(matches_started_total.clone()))?;

        Ok(Self {
            active_groups,
            groups_created_total,
            joins_total,
            leaves_total,
            kicks_total,
            matches_started_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let enqueued_total = IntCounterVec::new(
            Opts::new("party_queue_enqueued_total", "Parties enqueued for a match"),
            &["queue"],
        )?;
        registry.register(Box::new(enqueued_total.clone()))?;

        let dequeued_total = IntCounterVec::new(
            Opts::new("party_queue_dequeued_total", "Parties removed from a queue"),
            &["queue"],
        )?;
        registry.register(Box::new(dequeued_total.clone()))?;

        let parties_waiting = IntGaugeVec::new(
            Opts::new("party_queue_parties_waiting", "Parties currently queued"),
            &["queue"],
        )?;
        registry.register(Box::new(parties_waiting.clone()))?;

        let drains_total = IntCounterVec::new(
            Opts::new("party_queue_drains_total", "Drain attempts"),
            &["queue", "outcome"],
        )?;
        registry.register(Box::new(drains_total.clone()))?;

        let matches_formed_total = IntCounterVec::new(
            Opts::new(
                "party_queue_matches_formed_total",
                "Matches formed from the queue",
            ),
            &["queue"],
        )?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let under_filled_total = IntCounter::new(
            "party_queue_under_filled_total",
            "Matches started below their target size",
        )?;
        registry.register(Box::new(under_filled_total.clone()))?;

        let drain_duration = HistogramVec::new(
            HistogramOpts::new("party_queue_drain_duration_seconds", "Drain duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["queue"],
        )?;
        registry.register(Box::new(drain_duration.clone()))?;

        let store_errors_total = IntCounterVec::new(
            Opts::new(
                "party_queue_store_errors_total",
                "Ordered store failures",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(store_errors_total.clone()))?;

        let assignment_duration = Histogram::with_opts(
            HistogramOpts::new(
                "party_queue_assignment_duration_seconds",
                "Subset search duration",
            )
            .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005]),
        )?;
        registry.register(Box::new(assignment_duration.clone()))?;

        Ok(Self {
            enqueued_total,
            dequeued_total,
            parties_waiting,
            drains_total,
            matches_formed_total,
            under_filled_total,
            drain_duration,
            store_errors_total,
            assignment_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
