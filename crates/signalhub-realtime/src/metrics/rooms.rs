//! Room membership metrics helpers.

use std::sync::atomic::Ordering;

use super::RealtimeMetrics;

/// Record an admission
pub fn record_join(metrics: &RealtimeMetrics) {
    metrics.joins.fetch_add(1, Ordering::Relaxed);
}

/// Record a removal
pub fn record_departure(metrics: &RealtimeMetrics) {
    metrics.departures.fetch_add(1, Ordering::Relaxed);
}

/// Record participants removed by a sweep
pub fn record_reclaimed(metrics: &RealtimeMetrics, count: u64) {
    metrics
        .participants_reclaimed
        .fetch_add(count, Ordering::Relaxed);
}

/// Record a store call abandoned on timeout
pub fn record_store_timeout(metrics: &RealtimeMetrics) {
    metrics.store_timeouts.fetch_add(1, Ordering::Relaxed);
}
