//! Response DTOs.

use serde::{Deserialize, Serialize};

use signalhub_core::traits::StoreMode;
use signalhub_realtime::metrics::MetricsSnapshot;

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// `ok`, or `degraded` when the store is unreachable.
    pub status: String,
    /// Membership store family.
    pub store_mode: StoreMode,
    /// Store reachability.
    pub store: String,
    /// Attached WebSocket connections.
    pub ws_connections: usize,
    /// Rooms with a live presence worker.
    pub active_rooms: usize,
    /// Engine counters.
    pub metrics: MetricsSnapshot,
}
