//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::infrastructure::event_loop::MultiplexerHandle;

use super::{
    handler::{
        http::{get_stats, health_check},
        poll::{DEFAULT_MAX_BODY_BYTES, poll_handler},
    },
    signal::shutdown_signal,
    state::AppState,
};

/// HTTP-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Requests with a larger body are rejected and their connection closed.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Build the router for the long-polling endpoint and the HTTP API.
pub fn build_router(multiplexer: MultiplexerHandle, config: ServerConfig) -> Router {
    let app_state = Arc::new(AppState {
        multiplexer,
        max_body_bytes: config.max_body_bytes,
    });

    Router::new()
        // Long-polling エンドポイント
        .route("/poll", post(poll_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Long-polling server
///
/// # Example
///
/// ```ignore
/// let (multiplexer, _task) = spawn_multiplexer(config, handler, clock);
/// let server = Server::new(multiplexer, ServerConfig::default());
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    multiplexer: MultiplexerHandle,
    config: ServerConfig,
}

impl Server {
    pub fn new(multiplexer: MultiplexerHandle, config: ServerConfig) -> Self {
        Self {
            multiplexer,
            config,
        }
    }

    /// Run the server until Ctrl+C or SIGTERM.
    ///
    /// On shutdown every session is closed first, so held long polls are
    /// answered and do not block the graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = build_router(self.multiplexer.clone(), self.config);

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        // Start the server
        tracing::info!(
            "Long-polling server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Poll endpoint: http://{}/poll", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        let multiplexer = self.multiplexer;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                if let Err(e) = multiplexer.shutdown().await {
                    tracing::warn!("Multiplexer already stopped: {}", e);
                }
            })
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
