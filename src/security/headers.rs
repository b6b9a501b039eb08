//! Header manipulation.
//!
//! # Responsibilities
//! - Build the outbound X-Forwarded-For chain
//! - Copy origin response headers onto the relay response
//! - Refuse hop-by-hop headers, which do not survive re-framing
//!
//! # Design Decisions
//! - Client address goes first in X-Forwarded-For
//! - Header copy is best-effort: a refused header is logged and skipped
//! - Repeated origin headers collapse to the last value

use std::net::IpAddr;

use axum::http::{HeaderMap, HeaderName};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that describe a single connection rather than the resource.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// `"<client>, <inbound>"` when an inbound chain exists, else `"<client>"`.
pub fn forwarded_for(client_ip: IpAddr, inbound: Option<&str>) -> String {
    match inbound.map(str::trim).filter(|v| !v.is_empty()) {
        Some(chain) => format!("{}, {}", client_ip, chain),
        None => client_ip.to_string(),
    }
}

/// Split an X-Forwarded-For chain into its left-most address and the hops
/// after it. `None` when the head is not an IP.
pub fn split_forwarded(chain: &str) -> Option<(IpAddr, Option<&str>)> {
    let (head, rest) = match chain.split_once(',') {
        Some((head, rest)) => (head, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (chain, None),
    };
    Some((head.trim().parse().ok()?, rest))
}

/// An origin header that was not carried onto the relay response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("header '{name}' cannot be copied")]
pub struct HeaderCopyRefused {
    pub name: String,
}

/// Copy every copyable header from `from` into `to`.
///
/// Returns the headers that were refused. Each refusal is already logged;
/// callers only need the list for diagnostics.
pub fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) -> Vec<HeaderCopyRefused> {
    let mut refused = Vec::new();
    for (name, value) in from.iter() {
        if is_hop_by_hop(name) {
            let err = HeaderCopyRefused {
                name: name.to_string(),
            };
            tracing::debug!(error = %err, "Skipping origin header");
            refused.push(err);
            continue;
        }
        to.insert(name.clone(), value.clone());
    }
    refused
}
