//! Top-level signaling engine that ties together all subsystems.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use signalhub_core::config::AppConfig;
use signalhub_core::traits::{MembershipStore, ProfileDirectory, StoreMode};

use crate::connection::manager::ConnectionManager;
use crate::connection::pool::ConnectionPool;
use crate::liveness::LivenessMonitor;
use crate::metrics::RealtimeMetrics;
use crate::presence::PresenceNotifier;
use crate::relay::SignalingRelay;
use crate::room::{DisconnectPolicy, RoomManager};

/// Central signaling engine that coordinates all WebSocket subsystems.
#[derive(Clone)]
pub struct SignalingEngine {
    /// Connection manager.
    pub connections: Arc<ConnectionManager>,
    /// Room membership orchestration.
    pub rooms: Arc<RoomManager>,
    /// Signal forwarding.
    pub relay: Arc<SignalingRelay>,
    /// Presence broadcast.
    pub presence: Arc<PresenceNotifier>,
    /// Stale participant reclamation.
    pub liveness: Arc<LivenessMonitor>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    /// Membership store.
    store: Arc<dyn MembershipStore>,
    /// Upper bound on a store health check.
    store_timeout: Duration,
    /// Running liveness sweep, if started.
    monitor_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for SignalingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingEngine")
            .field("mode", &self.store.mode())
            .finish()
    }
}

impl SignalingEngine {
    /// Creates a new signaling engine over `store`.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn MembershipStore>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let metrics = Arc::new(RealtimeMetrics::new());
        let pool = Arc::new(ConnectionPool::new());
        let presence = Arc::new(PresenceNotifier::new(
            pool.clone(),
            metrics.clone(),
            &config.presence,
        ));
        let rooms = Arc::new(RoomManager::new(
            store.clone(),
            profiles,
            presence.clone(),
            metrics.clone(),
            config.store.operation_timeout(),
        ));
        let relay = Arc::new(SignalingRelay::new(
            rooms.clone(),
            pool.clone(),
            metrics.clone(),
        ));
        let liveness = Arc::new(LivenessMonitor::new(
            rooms.clone(),
            metrics.clone(),
            config.liveness.clone(),
        ));
        let policy = DisconnectPolicy::for_mode(store.mode());
        let connections = Arc::new(ConnectionManager::new(
            config.realtime.clone(),
            pool,
            rooms.clone(),
            relay.clone(),
            metrics.clone(),
            policy,
        ));

        info!(mode = ?store.mode(), ?policy, "Signaling engine initialized");

        Self {
            connections,
            rooms,
            relay,
            presence,
            liveness,
            metrics,
            store,
            store_timeout: config.store.operation_timeout(),
            monitor_task: Arc::new(Mutex::new(None)),
            shutdown_tx,
        }
    }

    /// Starts background tasks. The liveness sweep only runs against a
    /// volatile store.
    pub fn start(&self) {
        if self.store.mode() != StoreMode::Volatile {
            info!("Durable store in use, liveness sweep disabled");
            return;
        }

        let Ok(mut slot) = self.monitor_task.lock() else {
            warn!("Liveness monitor slot poisoned, sweep not started");
            return;
        };
        if slot.is_some() {
            return;
        }
        let monitor = self.liveness.clone();
        *slot = Some(tokio::spawn(monitor.run(self.shutdown_tx.subscribe())));
    }

    /// Which store family backs membership.
    pub fn store_mode(&self) -> StoreMode {
        self.store.mode()
    }

    /// Whether the membership store is reachable.
    pub async fn store_healthy(&self) -> bool {
        matches!(
            tokio::time::timeout(self.store_timeout, self.store.health_check()).await,
            Ok(Ok(true))
        )
    }

    /// Returns a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiates a graceful shutdown of the signaling engine.
    pub async fn shutdown(&self, grace: Duration) {
        info!("Shutting down signaling engine");

        let _ = self.shutdown_tx.send(());
        self.connections.close_all();
        self.presence.retire_all();

        let task = self.monitor_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!("Liveness monitor did not stop within the grace period");
            }
        }

        info!("Signaling engine shut down");
    }
}
