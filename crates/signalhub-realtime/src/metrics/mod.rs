//! Realtime engine metrics.

pub mod connections;
pub mod messages;
pub mod rooms;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    /// Total connections established
    pub connections_opened: AtomicU64,
    /// Connections currently attached
    pub connections_active: AtomicU64,
    /// Total inbound frames received
    pub messages_received: AtomicU64,
    /// Total outbound frames delivered to a connection queue
    pub messages_sent: AtomicU64,
    /// Outbound frames dropped (queue full or closed)
    pub messages_dropped: AtomicU64,
    /// Admissions into a room (fresh, moved or rejoined)
    pub joins: AtomicU64,
    /// Removals from a room (leave, disconnect or reclaim)
    pub departures: AtomicU64,
    /// Signals forwarded to a peer
    pub relays: AtomicU64,
    /// Signals that could not be forwarded
    pub relay_failures: AtomicU64,
    /// Participants removed by the liveness sweep
    pub participants_reclaimed: AtomicU64,
    /// Store calls abandoned on timeout
    pub store_timeouts: AtomicU64,
}

impl RealtimeMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            departures: self.departures.load(Ordering::Relaxed),
            relays: self.relays.load(Ordering::Relaxed),
            relay_failures: self.relay_failures.load(Ordering::Relaxed),
            participants_reclaimed: self.participants_reclaimed.load(Ordering::Relaxed),
            store_timeouts: self.store_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections established
    pub connections_opened: u64,
    /// Connections currently attached
    pub connections_active: u64,
    /// Total inbound frames received
    pub messages_received: u64,
    /// Total outbound frames delivered to a connection queue
    pub messages_sent: u64,
    /// Outbound frames dropped
    pub messages_dropped: u64,
    /// Room admissions
    pub joins: u64,
    /// Room removals
    pub departures: u64,
    /// Signals forwarded
    pub relays: u64,
    /// Signals not forwarded
    pub relay_failures: u64,
    /// Participants reclaimed by the liveness sweep
    pub participants_reclaimed: u64,
    /// Store calls abandoned on timeout
    pub store_timeouts: u64,
}
