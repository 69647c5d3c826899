//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use signalhub_core::config::AppConfig;
use signalhub_realtime::SignalingEngine;
use signalhub_realtime::connection::WsAuthenticator;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Signaling engine
    pub engine: Arc<SignalingEngine>,
    /// Token verification for the WebSocket upgrade
    pub authenticator: Arc<WsAuthenticator>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}
