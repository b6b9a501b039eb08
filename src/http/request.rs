//! Request handling.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and propagate it to the response
//! - Parse the relay query string (`url`, `jpeg`, `bw`, `l`)
//! - Extract the client context forwarded to the origin
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Query values are taken permissively: quality is not range-checked here

use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

use crate::relay::RelayError;
use crate::security::headers::{split_forwarded, X_FORWARDED_FOR};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a UUID v4 request ID when the client did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Layer that stamps inbound requests with `x-request-id`.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Convenience accessor for the request ID on a header map.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Raw relay parameters as they appeared in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayQuery {
    pub urls: Vec<String>,
    pub jpeg: Option<String>,
    pub bw: Option<String>,
    pub quality: Option<String>,
}

impl RelayQuery {
    /// Parse a query string. Repeated `url` values are all kept; for the
    /// other keys the first occurrence wins.
    pub fn parse(query: Option<&str>) -> Self {
        let mut parsed = RelayQuery::default();
        let Some(query) = query else {
            return parsed;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "url" => parsed.urls.push(value.into_owned()),
                "jpeg" if parsed.jpeg.is_none() => parsed.jpeg = Some(value.into_owned()),
                "bw" if parsed.bw.is_none() => parsed.bw = Some(value.into_owned()),
                "l" if parsed.quality.is_none() => parsed.quality = Some(value.into_owned()),
                _ => {}
            }
        }
        parsed
    }

    /// The target URL. A URL that itself contained `&url=` arrives split
    /// into several values and is stitched back together here.
    pub fn target_url(&self) -> Option<String> {
        if self.urls.is_empty() {
            return None;
        }
        let joined = self.urls.join("&url=");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// WebP is assumed unless `jpeg` carries a non-empty value.
    pub fn supports_webp(&self) -> bool {
        self.jpeg.as_deref().map_or(true, str::is_empty)
    }

    /// Grayscale unless `bw` is exactly `"0"`.
    pub fn grayscale(&self) -> bool {
        self.bw.as_deref() != Some("0")
    }

    /// Quality from `l`, falling back to `default` when missing, unparseable
    /// or zero. Not range-checked.
    pub fn quality_or(&self, default: i64) -> i64 {
        match self.quality.as_deref().and_then(parse_leading_int) {
            Some(0) | None => default,
            Some(quality) => quality,
        }
    }
}

/// Parse the leading integer of a string: optional whitespace, optional
/// sign, then digits. Trailing garbage is ignored (`"90px"` → 90).
fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Everything the pipeline needs to know about one inbound request.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub url: String,
    pub client_ip: IpAddr,
    pub forwarded_for: Option<String>,
    pub cookie: Option<HeaderValue>,
    pub dnt: Option<HeaderValue>,
    pub supports_webp: bool,
    pub grayscale: bool,
    pub quality: i64,
}

impl RelayRequest {
    /// Build the request context from the query, inbound headers and peer.
    pub fn from_parts(
        query: &RelayQuery,
        headers: &HeaderMap,
        peer: SocketAddr,
        trust_proxy: bool,
        default_quality: i64,
    ) -> Result<Self, RelayError> {
        let url = query.target_url().ok_or(RelayError::MissingTarget)?;

        let inbound = headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok());

        // A trusted chain already starts with the client; its head moves into
        // `client_ip` so the outbound chain does not repeat it.
        let trusted = inbound.filter(|_| trust_proxy).and_then(split_forwarded);
        let (client_ip, forwarded_for) = match trusted {
            Some((ip, rest)) => (ip, rest.map(str::to_string)),
            None => (peer.ip(), inbound.map(str::to_string)),
        };

        Ok(Self {
            url,
            client_ip,
            forwarded_for,
            cookie: headers.get(header::COOKIE).cloned(),
            dnt: headers.get(header::DNT).cloned(),
            supports_webp: query.supports_webp(),
            grayscale: query.grayscale(),
            quality: query.quality_or(default_quality),
        })
    }
}
