//! Bandwidth-saving image relay (v1)
//!
//! Fetches an image on the client's behalf, re-encodes it to WebP or JPEG
//! when that is likely to help, and returns it with savings headers.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    IMAGE RELAY                       │
//!                      │                                                      │
//!   GET /?url=...      │  ┌─────────┐   ┌──────────┐   ┌─────────────────┐   │
//!   ───────────────────┼─▶│  http   │──▶│ security │──▶│  relay fetcher  │───┼──▶ Origin
//!                      │  │ server  │   │   auth   │   │ (timeout, 5x3xx)│◀──┼─── image
//!                      │  └─────────┘   └──────────┘   └────────┬────────┘   │
//!                      │                                        │            │
//!                      │                                        ▼            │
//!                      │                               ┌─────────────────┐   │
//!                      │                               │  relay policy   │   │
//!                      │                               └───┬─────────┬───┘   │
//!                      │                          eligible │         │ no    │
//!                      │                                   ▼         │       │
//!                      │                          ┌──────────────┐   │       │
//!                      │                          │  transcode   │   │       │
//!                      │                          │ webp / jpeg  │   │       │
//!                      │                          └──────┬───────┘   │       │
//!   200 / 302 / 400    │  ┌──────────┐                   │           │       │
//!   ◀──────────────────┼──│ response │◀──────────────────┴───────────┘       │
//!                      │  │   slot   │                                       │
//!                      │  └──────────┘                                       │
//!                      │                                                      │
//!                      │  config · observability · lifecycle                 │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use bandwidth_relay::config::{self, RelayConfig};
use bandwidth_relay::lifecycle::{startup, Shutdown};
use bandwidth_relay::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "bandwidth-relay")]
#[command(about = "Bandwidth-saving image compression relay", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listening port; overrides the port of `listener.bind_address`.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Basic-auth login; the guard is off unless a password is also set.
    #[arg(long, env = "LOGIN")]
    login: Option<String>,

    /// Basic-auth password; the guard is off unless a login is also set.
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Result<RelayConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => RelayConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if self.login.is_some() {
            config.auth.login = self.login;
        }
        if self.password.is_some() {
            config.auth.password = self.password;
        }
        if self.log_json {
            config.observability.log_json = true;
        }

        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.into_config()?;

    logging::init_tracing(&config.observability);

    tracing::info!("bandwidth-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        auth_enabled = config.auth.credentials().is_some(),
        upstream_timeout_ms = config.upstream.timeout_ms,
        max_redirects = config.upstream.max_redirects,
        default_quality = config.compression.default_quality,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
