//! Relay error taxonomy and its mapping to terminal responses.

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
};

use crate::config::{RelayConfig, PRODUCT_NAME};

/// Fragment appended to the origin URL when falling back to a redirect.
/// Clients treat it as "do not try to recompress this again".
pub const NO_COMPRESS_MARKER: &str = "#bh-no-compress=1";

/// Errors that end a relay request. Each maps to exactly one response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Basic-auth credentials missing or wrong.
    #[error("access denied")]
    AuthRejected,

    /// No `url` parameter on the request.
    #[error("no target url supplied")]
    MissingTarget,

    /// Network error, timeout, or a non-200 origin status.
    #[error("upstream unavailable for {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    /// Decode or encode failed, or took too long.
    #[error("transcode failed: {0}")]
    TranscodeFailure(String),
}

impl RelayError {
    pub fn upstream(url: impl Into<String>, reason: impl ToString) -> Self {
        RelayError::UpstreamUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transcode(reason: impl ToString) -> Self {
        RelayError::TranscodeFailure(reason.to_string())
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::AuthRejected => "rejected",
            RelayError::MissingTarget => "landing",
            RelayError::UpstreamUnavailable { .. } => "redirected",
            RelayError::TranscodeFailure(_) => "failed",
        }
    }

    /// Build the terminal response for this error.
    pub fn into_response(self, config: &RelayConfig) -> Response<Body> {
        match self {
            RelayError::AuthRejected => {
                let mut response = Response::new(Body::from("Access denied"));
                *response.status_mut() = StatusCode::UNAUTHORIZED;
                let challenge = format!("Basic realm=\"{}\"", PRODUCT_NAME);
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
                response
            }
            RelayError::MissingTarget => redirect(&config.landing_url),
            RelayError::UpstreamUnavailable { url, .. } => redirect(&no_compress_location(&url)),
            RelayError::TranscodeFailure(_) => bare(StatusCode::BAD_REQUEST),
        }
    }
}

/// `Location` for the uncompressed fallback: the original URL with the
/// marker fragment, escaped the way a browser's `encodeURI` would.
pub fn no_compress_location(url: &str) -> String {
    super::encode_uri(&format!("{}{}", url, NO_COMPRESS_MARKER))
}

/// A 302 with the given location and no body.
pub fn redirect(location: &str) -> Response<Body> {
    let mut response = bare(StatusCode::FOUND);
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => {
            tracing::warn!(location = %location, error = %e, "Unrepresentable redirect location");
        }
    }
    response
}

/// A response with only a status line.
pub fn bare(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RelayConfig {
        RelayConfig::default()
    }

    #[test]
    fn auth_rejected_carries_challenge() {
        let response = RelayError::AuthRejected.into_response(&config());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Bandwidth-Hero Compressor\""
        );
    }

    #[test]
    fn missing_target_redirects_to_landing() {
        let response = RelayError::MissingTarget.into_response(&config());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://bandwidth-hero.com");

        let mut custom = config();
        custom.landing_url = "https://landing.test/".into();
        let response = RelayError::MissingTarget.into_response(&custom);
        assert_eq!(response.headers()[header::LOCATION], "https://landing.test/");
    }

    #[test]
    fn upstream_failure_redirects_with_marker() {
        let err = RelayError::upstream("http://img.test/a b.png", "status 500");
        let response = err.into_response(&config());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://img.test/a%20b.png#bh-no-compress=1"
        );
    }

    #[test]
    fn transcode_failure_is_bare_400() {
        let response = RelayError::transcode("bad data").into_response(&config());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().is_empty());
    }

    #[test]
    fn outcomes() {
        assert_eq!(RelayError::AuthRejected.outcome(), "rejected");
        assert_eq!(RelayError::MissingTarget.outcome(), "landing");
        assert_eq!(RelayError::upstream("u", "r").outcome(), "redirected");
        assert_eq!(RelayError::transcode("x").outcome(), "failed");
    }
}
