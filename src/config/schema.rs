//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Product identifier sent upstream and used as the basic-auth realm.
pub const PRODUCT_NAME: &str = "Bandwidth-Hero Compressor";

/// Where clients without a target URL are sent.
pub const DEFAULT_LANDING_URL: &str = "https://bandwidth-hero.com";

/// Root configuration for the image relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Optional basic-auth credentials.
    pub auth: AuthConfig,

    /// Outbound fetch settings.
    pub upstream: UpstreamConfig,

    /// Compression policy and encoder settings.
    pub compression: CompressionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Redirect target for requests that carry no `url` parameter.
    pub landing_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            auth: AuthConfig::default(),
            upstream: UpstreamConfig::default(),
            compression: CompressionConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            landing_url: DEFAULT_LANDING_URL.to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.bind_address.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.bind_address.clone(),
        };
        self.bind_address = format!("{}:{}", host, port);
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Basic-auth credentials. The guard is active only when both are set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub login: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    /// Returns the credential pair when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.login.as_deref(), self.password.as_deref()) {
            (Some(login), Some(password)) if !login.is_empty() && !password.is_empty() => {
                Some((login, password))
            }
            _ => None,
        }
    }

    /// Exactly one half is set; the guard stays open.
    pub fn is_partial(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.login) != set(&self.password)
    }
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// `User-Agent` presented to origins.
    pub user_agent: String,

    /// Total fetch timeout in milliseconds.
    pub timeout_ms: u64,

    /// Maximum redirect hops followed before failing.
    pub max_redirects: usize,

    /// Take the client address from the left-most `X-Forwarded-For` entry.
    pub trust_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: PRODUCT_NAME.to_string(),
            timeout_ms: 5000,
            max_redirects: 5,
            trust_proxy: false,
        }
    }
}

/// Compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Quality used when the client sends none (or an unusable one).
    pub default_quality: i64,

    /// Smallest declared length worth recompressing to WebP.
    pub min_compress_length: u64,

    /// Smallest PNG/GIF worth recompressing when only JPEG is available.
    pub min_transparent_compress_length: u64,

    /// Upper bound for a single decode/encode in milliseconds.
    pub transcode_timeout_ms: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default_quality: 40,
            min_compress_length: 512,
            min_transparent_compress_length: 100_000,
            transcode_timeout_ms: 10_000,
        }
    }
}

/// Timeout configuration for the inbound side.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
