//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → auth.rs (optional basic-auth gate)
//!     → relay pipeline
//!         → headers.rs (X-Forwarded-For out, header copy back)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a configured guard rejects anything but an exact match
//! - Hop-by-hop headers never cross the relay

pub mod auth;
pub mod headers;

pub use auth::AccessGuard;
