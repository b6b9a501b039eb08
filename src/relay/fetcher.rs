//! Origin fetcher.
//!
//! # Responsibilities
//! - GET the target URL on the client's behalf
//! - Forward client context (X-Forwarded-For, Cookie, DNT)
//! - Bound the fetch with a timeout and a redirect cap
//! - Treat anything but a 200 as unavailable
//!
//! # Design Decisions
//! - A fresh client (and cookie jar) per fetch: cookies picked up while
//!   following redirects never leak into another request
//! - No body size limit at this layer
//! - No retries; the caller falls back to redirecting the client

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use reqwest::{cookie::Jar, redirect};

use super::error::RelayError;
use crate::config::UpstreamConfig;
use crate::http::request::RelayRequest;
use crate::security::headers::{forwarded_for, X_FORWARDED_FOR};

/// What came back from the origin.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    /// Declared `Content-Type`, if readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Declared `Content-Length`. A non-numeric value counts as absent.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Issues outbound fetches according to [`UpstreamConfig`].
#[derive(Debug, Clone)]
pub struct OriginFetcher {
    config: UpstreamConfig,
}

impl OriginFetcher {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .redirect(redirect::Policy::limited(self.config.max_redirects))
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .build()
    }

    /// Headers sent to the origin for this request.
    pub fn outbound_headers(&self, request: &RelayRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();

        match HeaderValue::from_str(&self.config.user_agent) {
            Ok(value) => {
                headers.insert(header::USER_AGENT, value);
            }
            Err(e) => tracing::warn!(error = %e, "Configured user agent is not a valid header value"),
        }

        let chain = forwarded_for(request.client_ip, request.forwarded_for.as_deref());
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }

        if let Some(cookie) = &request.cookie {
            headers.insert(header::COOKIE, cookie.clone());
        }
        if let Some(dnt) = &request.dnt {
            headers.insert(header::DNT, dnt.clone());
        }

        headers
    }

    /// Fetch the target. Any transport error, timeout, or non-200 status
    /// becomes [`RelayError::UpstreamUnavailable`].
    pub async fn fetch(&self, request: &RelayRequest) -> Result<OriginResponse, RelayError> {
        let client = self
            .client()
            .map_err(|e| RelayError::upstream(&request.url, e))?;

        let response = client
            .get(&request.url)
            .headers(self.outbound_headers(request))
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("timed out after {}ms", self.config.timeout_ms)
                } else {
                    e.to_string()
                };
                RelayError::upstream(&request.url, reason)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RelayError::upstream(&request.url, format!("status {}", status)));
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::upstream(&request.url, e))?;

        tracing::debug!(
            url = %request.url,
            status = %status,
            bytes = body.len(),
            "Origin responded"
        );

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
