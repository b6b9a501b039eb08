//! Image relay core.
//!
//! # Data Flow
//! ```text
//! inbound GET /?url=...
//!     → security::auth (basic-auth gate)
//!     → fetcher.rs (origin GET, 5s timeout, 5 redirects)
//!         ✗ → 302 <url>#bh-no-compress=1
//!     → policy.rs (eligible?)
//!         no  → 200 origin bytes + X-Proxy-Bypass
//!         yes → transcode.rs (decode, grayscale, WebP/JPEG)
//!                 ✗ → 400
//!                 ✓ → 200 + X-Original-Size / X-Bytes-Saved
//! ```
//!
//! # Design Decisions
//! - Stateless: nothing survives a request except the immutable config
//! - Two suspension points per request: fetch and transcode
//! - No retries; every failure is answered immediately

pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod policy;
pub mod transcode;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub use error::{RelayError, NO_COMPRESS_MARKER};
pub use fetcher::{OriginFetcher, OriginResponse};
pub use pipeline::RelayPipeline;
pub use policy::{should_compress, CompressionPolicy, TargetFormat};
pub use transcode::{ImageTranscoder, TranscodeOptions, Transcoded, Transcoder};

/// Characters a browser's `encodeURI` leaves alone.
const URI_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// Escape a full URL the way `encodeURI` does. `%` is escaped too.
pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, URI_SET).to_string()
}
