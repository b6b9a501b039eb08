//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, query parsing, client context)
//!     → [relay pipeline]
//!     → response.rs (response slot, savings headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RelayQuery, RelayRequest, RequestIdExt, X_REQUEST_ID};
pub use response::{ResponseSlot, ResponseState};
pub use server::RelayServer;
