//! The per-request relay pipeline.
//!
//! Guard → fetch → policy → transcode or passthrough, answered through a
//! single [`ResponseSlot`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Response};

use super::error::RelayError;
use super::fetcher::OriginFetcher;
use super::policy::{CompressionPolicy, TargetFormat};
use super::transcode::{ImageTranscoder, TranscodeOptions, Transcoded, Transcoder};
use crate::config::RelayConfig;
use crate::http::request::{RelayQuery, RelayRequest, RequestIdExt};
use crate::http::response::{self, ResponseSlot};
use crate::observability::metrics;
use crate::security::AccessGuard;

/// Everything a request needs, built once from the configuration.
#[derive(Clone)]
pub struct RelayPipeline {
    config: Arc<RelayConfig>,
    guard: AccessGuard,
    fetcher: OriginFetcher,
    policy: CompressionPolicy,
    transcoder: Arc<dyn Transcoder>,
}

impl RelayPipeline {
    pub fn new(config: Arc<RelayConfig>) -> Self {
        Self::with_transcoder(config, Arc::new(ImageTranscoder))
    }

    /// Use a different codec (tests record what the encoder was asked for).
    pub fn with_transcoder(config: Arc<RelayConfig>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            guard: AccessGuard::new(&config.auth),
            fetcher: OriginFetcher::new(config.upstream.clone()),
            policy: CompressionPolicy::from(&config.compression),
            transcoder,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run one request to completion and return its response.
    pub async fn handle(
        &self,
        query: Option<&str>,
        headers: &HeaderMap,
        peer: SocketAddr,
    ) -> Response<Body> {
        let start = Instant::now();
        let request_id = headers.request_id().to_string();
        let mut slot = ResponseSlot::new();

        let outcome = match self.run(&mut slot, query, headers, peer, &request_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    RelayError::AuthRejected => {
                        tracing::warn!(request_id = %request_id, peer = %peer, "Access denied")
                    }
                    RelayError::MissingTarget => {
                        tracing::debug!(request_id = %request_id, "No target url; redirecting to landing page")
                    }
                    RelayError::UpstreamUnavailable { url, reason } => {
                        tracing::info!(request_id = %request_id, url = %url, reason = %reason, "Origin unavailable; redirecting client")
                    }
                    RelayError::TranscodeFailure(reason) => {
                        tracing::warn!(request_id = %request_id, reason = %reason, "Transcode failed")
                    }
                }
                let outcome = err.outcome();
                response::fail(&mut slot, err, &self.config);
                outcome
            }
        };

        metrics::record_request(outcome, start);
        slot.finish()
    }

    async fn run(
        &self,
        slot: &mut ResponseSlot,
        query: Option<&str>,
        headers: &HeaderMap,
        peer: SocketAddr,
        request_id: &str,
    ) -> Result<&'static str, RelayError> {
        self.guard.check(headers)?;

        let query = RelayQuery::parse(query);
        let request = RelayRequest::from_parts(
            &query,
            headers,
            peer,
            self.config.upstream.trust_proxy,
            self.config.compression.default_quality,
        )?;

        let origin = self.fetcher.fetch(&request).await?;

        let declared_length = origin.content_length();
        if !self
            .policy
            .eligible(origin.content_type(), declared_length, request.supports_webp)
        {
            tracing::debug!(
                request_id = %request_id,
                url = %request.url,
                content_type = origin.content_type().unwrap_or("-"),
                content_length = ?declared_length,
                "Passing origin bytes through"
            );
            slot.send(response::bypass(origin));
            return Ok("bypassed");
        }

        let options = TranscodeOptions {
            format: TargetFormat::negotiate(request.supports_webp),
            quality: request.quality,
            grayscale: request.grayscale,
        };
        let image = self.transcode(origin.body.clone(), options).await?;

        if slot.is_sent() {
            return Err(RelayError::transcode("response already sent"));
        }

        // Eligibility guarantees a non-zero declared length.
        let declared_length = declared_length.unwrap_or_default();
        let saved = response::bytes_saved(declared_length, image.size);
        tracing::info!(
            request_id = %request_id,
            url = %request.url,
            format = %image.format,
            quality = request.quality,
            grayscale = request.grayscale,
            original_size = declared_length,
            compressed_size = image.size,
            bytes_saved = saved,
            "Image compressed"
        );
        metrics::record_bytes_saved(saved);

        slot.send(response::compressed(&origin, declared_length, image));
        Ok("compressed")
    }

    /// Run the codec on the blocking pool, bounded by the transcode timeout.
    async fn transcode(&self, data: Bytes, options: TranscodeOptions) -> Result<Transcoded, RelayError> {
        let transcoder = Arc::clone(&self.transcoder);
        let limit = Duration::from_millis(self.config.compression.transcode_timeout_ms);
        let task = tokio::task::spawn_blocking(move || transcoder.transcode(&data, options));

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(RelayError::transcode(join_error)),
            Err(_) => Err(RelayError::transcode(format!(
                "timed out after {}ms",
                limit.as_millis()
            ))),
        }
    }
}
