//! Party Queue service binary
//!
//! Loads configuration, serves the health endpoints, runs the queue sweep
//! and shuts down on SIGINT / SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use party_queue::config::{validate_config, AppConfig};
use party_queue::queue::GateScope;
use party_queue::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Party and match membership with an exact-size matchmaking queue
#[derive(Parser, Debug)]
#[command(
    name = "party-queue",
    version,
    about = "Party and match membership service with an exact-size matchmaking queue",
    long_about = "Party Queue tracks which party and match every connected participant belongs to, \
                 enforces the privacy rules for joining them, and merges queued parties into \
                 started matches of exactly two or four participants."
)]
struct Args {
    /// TOML configuration file; environment variables are used without one
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the health and metrics port
    #[arg(long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Give every queue size its own drain gate
    #[arg(long)]
    per_size_gate: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    dry_run: bool,

    /// Start, run one health check, print it and exit with its status
    #[arg(long)]
    health_check: bool,
}

impl Args {
    /// Build the effective configuration: file or environment, then flags
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::from_env()?,
        };

        if let Some(level) = &self.log_level {
            config.service.log_level = level.clone();
        }
        if self.debug {
            config.service.log_level = "debug".to_string();
        }
        if let Some(port) = self.http_port {
            config.service.http_port = port;
        }
        if self.per_size_gate {
            config.queue.gate_scope = GateScope::PerSize;
        }

        validate_config(&config).context("Invalid configuration")?;
        Ok(config)
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn log_banner(config: &AppConfig) {
    info!("🚀 {} v{}", config.service.name, party_queue::VERSION);
    info!("   Log level: {}", config.service.log_level);
    info!("   HTTP port: {}", config.service.http_port);
    info!(
        "   Queue: buffer {} / ttl {}s / sweep every {}s",
        config.queue.buffer_size,
        config.queue.entry_ttl_seconds,
        config.queue.sweep_interval_seconds
    );
    info!(
        "   Drain gate: {} with {}ms cooldown",
        config.queue.gate_scope, config.queue.drain_cooldown_ms
    );
}

/// Exit code 0 only when every component is healthy
async fn run_health_check(config: AppConfig) -> Result<i32> {
    let app_state = Arc::new(AppState::new(config)?);
    app_state.start().await?;

    let report = HealthCheck::check(app_state.clone()).await;
    app_state.shutdown().await?;

    let report = report?;
    println!("{}", report.to_json()?);
    Ok(if report.status == HealthStatus::Healthy {
        0
    } else {
        1
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let app_state = Arc::new(AppState::new(config.clone())?);
    app_state.start().await?;

    info!("✅ {} is running, Ctrl+C to stop", config.service.name);
    shutdown_signal().await;

    info!("🛑 Shutting down (timeout {}s)", config.service.shutdown_timeout_seconds);
    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Shutdown complete"),
        Ok(Err(e)) => warn!("⚠️  Shutdown finished with errors: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, exiting anyway"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    if args.dry_run {
        log_banner(&config);
        info!("Configuration is valid, exiting (dry run)");
        return;
    }

    if args.health_check {
        let code = run_health_check(config).await.unwrap_or_else(|e| {
            error!("Health check failed: {:#}", e);
            1
        });
        std::process::exit(code);
    }

    log_banner(&config);
    if let Err(e) = serve(config).await {
        error!("Service failed: {:#}", e);
        std::process::exit(1);
    }
}
