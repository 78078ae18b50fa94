//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (cache sweepers, signal handler)
//! - Bind the listener and begin accepting traffic
//! - Tear down in reverse on shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ZipperConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, PidFile, Shutdown};
use crate::observability::{logging, metrics};
use crate::resilience::Timeouts;
use crate::zipper::{Zipper, ZipperError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize engine: {0}")]
    Engine(#[from] ZipperError),

    #[error("pid file {path}: {source}")]
    PidFile { path: PathBuf, source: std::io::Error },

    #[error("listener: {0}")]
    Listener(#[from] std::io::Error),
}

/// Run the zipper until a termination signal arrives.
pub async fn run(config: ZipperConfig, pid: Option<PathBuf>) -> Result<(), StartupError> {
    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "metric-zipper starting");

    let timeouts = Timeouts::from(&config.timeouts);
    if !timeouts.is_well_ordered() {
        tracing::warn!(
            global_ms = config.timeouts.global_ms,
            after_started_ms = config.timeouts.after_started_ms,
            connect_ms = config.timeouts.connect_ms,
            "Timeouts should satisfy connect <= after_started <= global"
        );
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let _pid_file = match pid {
        Some(path) => Some(PidFile::create(&path).map_err(|source| StartupError::PidFile { path, source })?),
        None => None,
    };

    let zipper = Arc::new(Zipper::from_config(&config)?);
    tracing::info!(
        backends = zipper.pool().len(),
        carbonsearch = config.carbonsearch.is_enabled(),
        concurrency_limit = config.concurrency_limit,
        expire_delay_secs = config.expire_delay_secs,
        "Engine ready"
    );

    let shutdown = Shutdown::new();
    let mut sweepers = Vec::new();
    if let Some(interval) = config.sweep_interval() {
        sweepers.push(Arc::clone(zipper.path_cache()).spawn_sweeper(interval, shutdown.subscribe()));
        sweepers.push(Arc::clone(zipper.search_cache()).spawn_sweeper(interval, shutdown.subscribe()));
    }
    let signal_handler = signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listen).await?;
    let server = HttpServer::new(zipper, config);
    let served = server.run(listener, shutdown.wait()).await;

    // The server can also stop on its own (listener error); stop the rest too.
    shutdown.trigger();
    signal_handler.abort();
    for sweeper in sweepers {
        let _ = sweeper.await;
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
