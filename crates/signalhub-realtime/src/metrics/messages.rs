//! Message metrics helpers.

use std::sync::atomic::Ordering;

use super::RealtimeMetrics;

/// Record frames queued to clients
pub fn record_sent(metrics: &RealtimeMetrics, count: u64) {
    metrics.messages_sent.fetch_add(count, Ordering::Relaxed);
}

/// Record frames that could not be queued
pub fn record_dropped(metrics: &RealtimeMetrics, count: u64) {
    metrics.messages_dropped.fetch_add(count, Ordering::Relaxed);
}

/// Record a message received from a client
pub fn record_received(metrics: &RealtimeMetrics) {
    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
}

/// Record a forwarded signal
pub fn record_relay(metrics: &RealtimeMetrics) {
    metrics.relays.fetch_add(1, Ordering::Relaxed);
}

/// Record a signal that could not be forwarded
pub fn record_relay_failure(metrics: &RealtimeMetrics) {
    metrics.relay_failures.fetch_add(1, Ordering::Relaxed);
}
