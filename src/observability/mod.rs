//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline decisions produce:
//!     → logging.rs (structured log events with request_id)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (text or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every pipeline log line
//! - Metrics are cheap (atomic increments) and off unless configured

pub mod logging;
pub mod metrics;
