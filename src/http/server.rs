//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Dispatch requests to the relay pipeline

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RelayConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::signals::shutdown_signal;
use crate::relay::{RelayPipeline, Transcoder};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: RelayPipeline,
}

/// HTTP server for the image relay.
pub struct RelayServer {
    router: Router,
    config: Arc<RelayConfig>,
}

impl RelayServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let config = Arc::new(config);
        let pipeline = RelayPipeline::new(Arc::clone(&config));
        Self::from_pipeline(config, pipeline)
    }

    /// Create a server whose pipeline uses the given codec.
    pub fn with_transcoder(config: RelayConfig, transcoder: Arc<dyn Transcoder>) -> Self {
        let config = Arc::new(config);
        let pipeline = RelayPipeline::with_transcoder(Arc::clone(&config), transcoder);
        Self::from_pipeline(config, pipeline)
    }

    fn from_pipeline(config: Arc<RelayConfig>, pipeline: RelayPipeline) -> Self {
        let state = AppState { pipeline };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(relay_handler))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until Ctrl-C/SIGTERM or a message on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            auth_enabled = self.config.auth.credentials().is_some(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = shutdown.recv() => {
                        tracing::info!("Shutdown requested");
                    }
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay handler: everything happens in the pipeline.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let (parts, _body) = request.into_parts();

    tracing::debug!(
        peer = %addr,
        query = parts.uri.query().unwrap_or(""),
        "Relay request"
    );

    state
        .pipeline
        .handle(parts.uri.query(), &parts.headers, addr)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    fn router(config: RelayConfig) -> Router {
        RelayServer::new(config)
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50000))))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_url_redirects_to_landing() {
        let response = router(RelayConfig::default()).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://bandwidth-hero.com");
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = router(RelayConfig::default()).oneshot(get_request("/")).await.unwrap();
        let id = response.headers()["x-request-id"].to_str().unwrap();
        assert_eq!(id.len(), 36);

        let request = Request::builder()
            .uri("/")
            .header("x-request-id", "given-id")
            .body(Body::empty())
            .unwrap();
        let response = router(RelayConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "given-id");
    }

    #[tokio::test]
    async fn guard_runs_before_url_check() {
        let mut config = RelayConfig::default();
        config.auth.login = Some("hero".into());
        config.auth.password = Some("pw".into());

        let response = router(config).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn other_methods_not_allowed() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/?url=http://img.test/a.png")
            .body(Body::empty())
            .unwrap();
        let response = router(RelayConfig::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn other_paths_not_found() {
        let response = router(RelayConfig::default())
            .oneshot(get_request("/images/a.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
