//! Liveness monitor — periodically reclaims participants that went quiet.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use signalhub_core::config::LivenessConfig;
use signalhub_core::traits::RemovalCondition;

use crate::metrics::{RealtimeMetrics, rooms};
use crate::room::RoomManager;

/// Sweeps the membership store for participants whose last activity is older
/// than the staleness threshold and removes them as disconnected.
#[derive(Debug)]
pub struct LivenessMonitor {
    /// Room operations.
    rooms: Arc<RoomManager>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
    /// Sweep cadence and threshold.
    config: LivenessConfig,
}

impl LivenessMonitor {
    /// Creates a monitor.
    pub fn new(rooms: Arc<RoomManager>, metrics: Arc<RealtimeMetrics>, config: LivenessConfig) -> Self {
        Self {
            rooms,
            metrics,
            config,
        }
    }

    /// Run one sweep. Returns the number of participants reclaimed.
    pub async fn sweep(&self) -> usize {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.config.staleness_threshold_seconds as i64);

        let stale = match self.rooms.stale_participants(cutoff).await {
            Ok(stale) => stale,
            Err(e) => {
                warn!(error = %e, "Liveness sweep could not list stale participants");
                return 0;
            }
        };

        let mut reclaimed = 0usize;
        for (room_id, participant_id) in stale {
            // Activity since the listing keeps the member.
            match self
                .rooms
                .reclaim(&participant_id, &room_id, RemovalCondition::IdleBefore(cutoff))
                .await
            {
                Ok(true) => {
                    reclaimed += 1;
                    info!(
                        room_id = %room_id,
                        participant_id = %participant_id,
                        "Reclaimed stale participant"
                    );
                }
                Ok(false) => {}
                Err(e) => warn!(
                    room_id = %room_id,
                    participant_id = %participant_id,
                    error = %e,
                    "Failed to reclaim stale participant"
                ),
            }
        }

        rooms::record_reclaimed(&self.metrics, reclaimed as u64);
        debug!(reclaimed, "Liveness sweep complete");
        reclaimed
    }

    /// Sweep on the configured interval until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.config.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(
            interval_seconds = self.config.sweep_interval_seconds,
            threshold_seconds = self.config.staleness_threshold_seconds,
            "Liveness monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    info!("Liveness monitor stopping");
                    break;
                }
            }
        }
    }
}
