//! Application startup and lifecycle management.
//!
//! Builds the shared inference client once, mounts the relay endpoint and the
//! health probe, and serves until SIGINT/SIGTERM.

use crate::config::{RelayConfig, MODEL_ID};
use crate::handlers;
use crate::services::providers::{InferenceClient, VertexClient, VertexConfig};
use crate::services::AccessTokenSource;
use axum::{
    middleware::from_fn,
    routing::{any, get},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Connect timeout for upstream calls. Request duration is left to the platform.
const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<dyn InferenceClient>,
}

impl AppState {
    pub fn new(inference: Arc<dyn InferenceClient>) -> Self {
        Self { inference }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handlers::relay))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with a Vertex AI client authenticated by ambient identity.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(UPSTREAM_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        let tokens = match config.vertex.access_token.clone() {
            Some(token) => {
                tracing::warn!("Using static access token from VERTEX_ACCESS_TOKEN");
                AccessTokenSource::Static(token)
            }
            None => AccessTokenSource::metadata_server(
                http.clone(),
                &format!("http://{}", config.vertex.metadata_host),
            ),
        };

        let vertex = VertexClient::new(
            VertexConfig {
                project_id: config.gcp.project_id.clone(),
                location: config.gcp.location.clone(),
                api_base: config.vertex.api_base.clone(),
            },
            http,
            tokens,
        );

        tracing::info!(
            project = %config.gcp.project_id,
            location = %config.gcp.location,
            model = MODEL_ID,
            "Initialized Vertex AI client"
        );

        Self::build_with_client(config, Arc::new(vertex)).await
    }

    /// Build the application around an existing inference client.
    pub async fn build_with_client(
        config: RelayConfig,
        inference: Arc<dyn InferenceClient>,
    ) -> Result<Self, AppError> {
        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Vertex relay listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState::new(inference),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, build_router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
