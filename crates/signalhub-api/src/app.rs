//! Application builder — wires router + middleware + state into an Axum app.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use signalhub_auth::{InMemoryProfileDirectory, JwtDecoder};
use signalhub_core::config::{AppConfig, CorsConfig};
use signalhub_core::error::AppError;
use signalhub_realtime::SignalingEngine;
use signalhub_realtime::connection::WsAuthenticator;
use signalhub_store::StoreManager;

use crate::middleware::cors::build_cors_layer;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState, cors_config: &CorsConfig) -> Router {
    build_router(state)
        .layer(build_cors_layer(cors_config))
        .layer(TraceLayer::new_for_http())
}

/// Builds shared state over an initialized store. The engine is not started.
pub fn build_state(config: AppConfig, store: &StoreManager) -> AppState {
    let profiles = Arc::new(InMemoryProfileDirectory::new());
    let decoder = Arc::new(JwtDecoder::new(&config.auth));
    let authenticator = Arc::new(WsAuthenticator::new(decoder, profiles.clone()));
    let engine = Arc::new(SignalingEngine::new(&config, store.store(), profiles));

    AppState {
        config: Arc::new(config),
        engine,
        authenticator,
        started_at: Instant::now(),
    }
}

/// Serves `state` on `listener` until `shutdown` resolves, then stops the engine.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AppError> {
    let engine = state.engine.clone();
    let grace = Duration::from_secs(state.config.server.shutdown_grace_seconds);
    let app = build_app(state.clone(), &state.config.server.cors);

    engine.start();

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")));

    engine.shutdown(grace).await;
    result
}

/// Runs the SignalHub server with the given configuration.
pub async fn run_server(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(backend = ?config.store.backend, "Starting SignalHub server");

    let store = StoreManager::new(&config.store).await?;
    if config.store.purge_on_startup {
        store.purge_on_startup().await?;
    }

    let addr = config.server.bind_address();
    let state = build_state(config, &store);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("SignalHub server listening on {}", addr);

    serve(listener, state, shutdown_signal()).await
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
