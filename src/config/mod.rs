//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI / environment overrides (PORT, LOGIN, PASSWORD)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc with the request handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no reload
//! - All fields have defaults to allow running without a file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, CompressionConfig, ListenerConfig, ObservabilityConfig, RelayConfig,
    TimeoutConfig, UpstreamConfig, DEFAULT_LANDING_URL, PRODUCT_NAME,
};
pub use validation::{validate_config, ValidationError};
