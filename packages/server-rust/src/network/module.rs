//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::handlers::{
    liveness_handler, obfuscate_handler, readiness_handler, usage_handler, AppState,
};
use super::load_shed::LoadShedLayer;
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;
use crate::config::AppConfig;
use crate::invoker::ProcessTransformer;
use crate::traits::Transformer;

/// Manages the HTTP server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates shared state (transformer, shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    config: Arc<AppConfig>,
    transformer: Arc<dyn Transformer>,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a module that runs the configured external tool.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let transformer = Arc::new(ProcessTransformer::new(config.tool.clone()));
        Self::with_transformer(config, transformer)
    }

    /// Creates a module around an arbitrary [`Transformer`].
    #[must_use]
    pub fn with_transformer(config: AppConfig, transformer: Arc<dyn Transformer>) -> Self {
        Self {
            config: Arc::new(config),
            transformer,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /` -- usage hint
    /// - `POST /obfuscate` -- transformation pipeline (behind admission control)
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    pub fn build_router(&self) -> Router {
        let state = AppState::new(
            Arc::clone(&self.config),
            Arc::clone(&self.transformer),
            Arc::clone(&self.shutdown),
        );

        let obfuscate = post(obfuscate_handler)
            .layer(LoadShedLayer::from_limit(self.config.max_concurrent_jobs));

        let routes = Router::new()
            .route("/", get(usage_handler))
            .route("/obfuscate", obfuscate)
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .with_state(state);

        with_http_layers(routes, &self.config.network)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = self.config.network.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local = listener.local_addr()?;

        info!(%local, "listener bound");
        let port = local.port();

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// After the signal the server reports `Draining`, stops accepting
    /// connections, and waits (up to the request timeout) for running
    /// pipelines to release their workspaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .expect("start() must be called before serve()");
        let router = self.build_router();
        let shutdown_ctrl = Arc::clone(&self.shutdown);

        let signal_ctrl = Arc::clone(&shutdown_ctrl);
        let signal = async move {
            shutdown.await;
            info!("shutdown signal received, draining");
            signal_ctrl.trigger_shutdown();
        };

        shutdown_ctrl.set_ready();

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        // Covers the case where serve() returned without the signal firing.
        shutdown_ctrl.trigger_shutdown();
        if shutdown_ctrl
            .wait_for_drain(self.config.network.request_timeout)
            .await
        {
            info!("all pipelines drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "drain timeout expired with pipelines still running"
            );
        }
        Ok(())
    }
}
