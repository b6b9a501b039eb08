//! Response assembly.
//!
//! # Responsibilities
//! - Track whether a request has been answered (`ResponseState`)
//! - Build compressed and bypass responses from the origin response
//! - Attach savings headers
//!
//! # Design Decisions
//! - Every terminal write goes through `ResponseSlot`, which refuses a
//!   second write instead of relying on the caller to check
//! - Origin headers are copied first, then overridden

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Response, StatusCode},
};

use crate::config::RelayConfig;
use crate::relay::fetcher::OriginResponse;
use crate::relay::transcode::Transcoded;
use crate::relay::RelayError;
use crate::security::headers::copy_headers;

pub const X_ORIGINAL_SIZE: HeaderName = HeaderName::from_static("x-original-size");
pub const X_BYTES_SAVED: HeaderName = HeaderName::from_static("x-bytes-saved");
pub const X_PROXY_BYPASS: HeaderName = HeaderName::from_static("x-proxy-bypass");

/// How far a request's response has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing written yet; any terminal response may still be chosen.
    NotSent,
    /// Status and headers are committed; only the body remains.
    HeadersSent,
    /// Body handed off; nothing more may be written.
    Closed,
}

/// Per-request holder for the single response a request may produce.
#[derive(Debug)]
pub struct ResponseSlot {
    state: ResponseState,
    response: Option<Response<Body>>,
}

impl Default for ResponseSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self {
            state: ResponseState::NotSent,
            response: None,
        }
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn is_sent(&self) -> bool {
        self.state != ResponseState::NotSent
    }

    /// Commit the response. Returns `false`, leaving the slot untouched,
    /// when something was already written.
    pub fn send(&mut self, response: Response<Body>) -> bool {
        if self.is_sent() {
            tracing::warn!(
                state = ?self.state,
                status = %response.status(),
                "Dropping second response for request"
            );
            return false;
        }
        self.state = ResponseState::HeadersSent;
        self.response = Some(response);
        true
    }

    /// Hand the committed response to the transport and close the slot.
    ///
    /// A slot that was never written yields a bare 500; every pipeline path
    /// writes before finishing, so this only surfaces a bug.
    pub fn finish(mut self) -> Response<Body> {
        self.state = ResponseState::Closed;
        match self.response.take() {
            Some(response) => response,
            None => {
                tracing::error!("Request finished without a response");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

/// 200 with the re-encoded image and savings headers.
///
/// `X-Original-Size` is the origin's declared length; `X-Bytes-Saved` is
/// that minus the actual encoded size and may be negative.
pub fn compressed(origin: &OriginResponse, declared_length: u64, image: Transcoded) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    copy_headers(&origin.headers, response.headers_mut());

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(image.format.content_type()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(image.size));
    headers.insert(X_ORIGINAL_SIZE, HeaderValue::from(declared_length));
    headers.insert(X_BYTES_SAVED, HeaderValue::from(bytes_saved(declared_length, image.size)));

    *response.status_mut() = StatusCode::OK;
    *response.body_mut() = Body::from(image.data);
    response
}

/// 200 with the origin bytes untouched and `X-Proxy-Bypass: 1`.
pub fn bypass(origin: OriginResponse) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    copy_headers(&origin.headers, response.headers_mut());
    response
        .headers_mut()
        .insert(X_PROXY_BYPASS, HeaderValue::from_static("1"));

    *response.status_mut() = StatusCode::OK;
    *response.body_mut() = Body::from(origin.body);
    response
}

/// Signed difference between declared and actual size, saturating at the
/// `i64` bounds.
pub fn bytes_saved(declared_length: u64, actual: u64) -> i64 {
    let saved = i128::from(declared_length) - i128::from(actual);
    saved.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Terminal response for an error, respecting what was already written.
///
/// Upstream failures after a write are swallowed; everything else is
/// answered through the slot.
pub fn fail(slot: &mut ResponseSlot, error: RelayError, config: &RelayConfig) {
    if slot.is_sent() {
        tracing::debug!(error = %error, "Response already sent; ignoring failure");
        return;
    }
    slot.send(error.into_response(config));
}
