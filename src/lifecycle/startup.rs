//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when configured
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::http::RelayServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid bind address '{address}': {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Bring the relay up and serve until shutdown.
pub async fn run(config: RelayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.auth.is_partial() {
        tracing::warn!("Only one of login/password is set; access guard disabled");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let addr: SocketAddr = config
        .listener
        .bind_address
        .parse()
        .map_err(|source| StartupError::Address {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
    let local_addr = listener.local_addr().map_err(StartupError::Bind)?;
    tracing::info!(address = %local_addr, "Listening for connections");

    RelayServer::new(config)
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}
