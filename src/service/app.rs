//! Main application state and service coordination
//!
//! `AppState` wires the membership services, the matchmaking queue and
//! metrics together, runs the background tasks and the health server, and
//! shuts them down again.

use crate::config::AppConfig;
use crate::events::{GroupEventPublisher, TracingEventPublisher};
use crate::group::friends::FriendGraph;
use crate::group::matches::MatchMembershipService;
use crate::group::party::PartyMembershipService;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::queue::matchmaking::{MatchmakingQueue, QueueOptions};
use crate::queue::store::QueueStores;
use crate::service::api::GroupApi;
use crate::service::health::ServiceStats;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    friends: Arc<FriendGraph>,
    parties: Arc<PartyMembershipService>,
    matches: Arc<MatchMembershipService>,
    queue: Arc<MatchmakingQueue>,
    api: GroupApi,

    metrics: Arc<MetricsCollector>,

    /// Present while the health server runs
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with in-memory stores and a logging
    /// event publisher
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_components(
            config,
            QueueStores::in_memory(),
            Arc::new(TracingEventPublisher::new()),
        )
    }

    /// Initialize the application around the given queue stores and
    /// event publisher
    pub fn with_components(
        config: AppConfig,
        stores: QueueStores,
        publisher: Arc<dyn GroupEventPublisher>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        let friends = Arc::new(FriendGraph::new());
        let parties = Arc::new(PartyMembershipService::new(
            friends.clone(),
            metrics.clone(),
        ));
        let matches = Arc::new(MatchMembershipService::new(
            parties.clone(),
            friends.clone(),
            metrics.clone(),
        ));

        let options = QueueOptions::from(&config.queue);
        info!(
            "Queue configuration: buffer={}, ttl={}s, cooldown={}ms, gate={}",
            options.buffer_size,
            options.entry_ttl.as_secs(),
            options.drain_cooldown.as_millis(),
            options.gate_scope
        );
        let queue = Arc::new(MatchmakingQueue::new(
            options,
            stores,
            parties.clone(),
            matches.clone(),
            publisher,
            metrics.clone(),
        ));

        let api = GroupApi::new(parties.clone(), matches.clone(), queue.clone());

        Ok(Self {
            config,
            friends,
            parties,
            matches,
            queue,
            api,
            metrics,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the health server and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_health_server().await?;
        self.start_background_tasks().await;

        info!("✅ {} service started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            } else {
                info!("✅ Health server stopped");
            }
        }

        let final_stats = self
            .stats()
            .await
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ {} shutdown completed", self.config.service.name);
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn api(&self) -> &GroupApi {
        &self.api
    }

    pub fn friends(&self) -> Arc<FriendGraph> {
        self.friends.clone()
    }

    pub fn parties(&self) -> Arc<PartyMembershipService> {
        self.parties.clone()
    }

    pub fn matches(&self) -> Arc<MatchMembershipService> {
        self.matches.clone()
    }

    pub fn queue(&self) -> Arc<MatchmakingQueue> {
        self.queue.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Current service statistics
    pub async fn stats(&self) -> Result<ServiceStats> {
        Ok(ServiceStats {
            active_parties: self.parties.party_count()?,
            active_matches: self.matches.match_count()?,
            queued_parties: self.queue.queued_count().await,
            matches_formed: self.metrics.matches_formed(),
            uptime_seconds: self.uptime().as_secs(),
        })
    }

    /// Bind the health and metrics endpoints
    async fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.http_port;
        info!("Starting health endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone()).with_app_state(self.clone()),
        );

        let task_server = server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = task_server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });

        *self.health_server.lock().await = Some(server);
        self.background_tasks.lock().await.push(handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    /// Start the expiry sweep and health metrics tasks
    pub async fn start_background_tasks(&self) {
        info!("Starting background maintenance tasks...");

        let sweep_interval = self.config.sweep_interval();
        info!(
            "Starting queue sweep task ({}s interval)...",
            sweep_interval.as_secs()
        );
        let sweep_task = {
            let queue = self.queue.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                info!("Queue sweep task started");

                while *is_running.read().await {
                    interval.tick().await;
                    let swept = queue.sweep_expired().await;
                    if swept == 0 {
                        debug!("Sweep completed - no expired queue entries");
                    }
                }

                info!("Queue sweep task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let metrics = self.metrics.clone();
            let parties = self.parties.clone();
            let matches = self.matches.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    metrics.update_uptime(started_at.elapsed());

                    let parties_ok = parties.party_count().is_ok();
                    let matches_ok = matches.match_count().is_ok();
                    metrics.update_component_health("parties", parties_ok);
                    metrics.update_component_health("matches", matches_ok);
                    metrics.update_health_status(if parties_ok && matches_ok { 2 } else { 0 });

                    debug!(
                        "Updated service health metrics - uptime: {}s",
                        started_at.elapsed().as_secs()
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(sweep_task);
        tasks.push(health_metrics_task);

        info!("{} background tasks running", tasks.len());
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
