//! Relay server listener
//!
//! Binds the HTTP/websocket listener and serves the relay router until a
//! shutdown signal arrives.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::auth::Authorizer;
use crate::error::Result;
use crate::ingest::IngestPipeline;
use crate::registry::ConnectionRegistry;
use crate::server::config::ServerConfig;
use crate::server::{http, ws};
use crate::session::SessionManager;
use crate::stats::RelayCounters;
use crate::storage::RecordStore;

/// Shared handles passed to every request handler
#[derive(Clone)]
pub struct RelayState {
    pub registry: Arc<ConnectionRegistry>,
    pub sessions: Arc<SessionManager>,
    pub pipeline: Arc<IngestPipeline>,
    pub counters: Arc<RelayCounters>,
    pub authorizer: Arc<dyn Authorizer>,
}

impl RelayState {
    /// Wire up registry, session table and pipeline over `store`
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let counters = Arc::new(RelayCounters::new());
        let registry = Arc::new(ConnectionRegistry::with_config(config.registry.clone()));
        let sessions = Arc::new(SessionManager::new(
            store,
            config.session.clone(),
            Arc::clone(&counters),
        ));
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&sessions),
            Arc::clone(&counters),
        ));

        Self {
            registry,
            sessions,
            pipeline,
            counters,
            authorizer,
        }
    }
}

/// Build the relay router over `state`
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/ws/device", get(ws::device_socket))
        .route("/ws/viewer", get(ws::viewer_socket))
        .route("/readings/save/{device_id}", post(http::toggle_recording))
        .route("/readings/status/{device_id}", get(http::recording_status))
        .route("/readings/download/{session_id}", get(http::download_session))
        .route("/devices", post(http::create_device).get(http::list_devices))
        .route(
            "/devices/{device_id}",
            get(http::get_device)
                .put(http::update_device)
                .delete(http::delete_device),
        )
        .route("/devices/{device_id}/sessions", get(http::list_sessions))
        .route("/stats", get(http::stats))
        .route("/health", get(http::health))
        .with_state(state)
}

/// Telemetry relay server
pub struct RelayServer {
    config: ServerConfig,
    state: RelayState,
}

impl RelayServer {
    /// Create a new server persisting into `store`
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let state = RelayState::new(&config, store, authorizer);
        Self { config, state }
    }

    /// Shared handler state
    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// Router serving every relay endpoint
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            max_viewers = self.config.registry.max_viewers_per_device,
            flush_threshold = self.config.session.flush_threshold,
            storage_cap = self.config.session.storage_cap,
            "Telemetry relay listening"
        );

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Server error");
        }
        result?;

        tracing::info!("Shutdown complete");
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
