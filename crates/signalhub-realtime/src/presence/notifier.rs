//! Presence notifier — runs one sequential broadcast worker per room.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use signalhub_core::config::PresenceConfig;
use signalhub_core::types::{MembershipSnapshot, Participant, ParticipantId, RoomId};

use crate::connection::pool::ConnectionPool;
use crate::message::serializer::serialize_outbound;
use crate::metrics::{RealtimeMetrics, messages};

use super::plan::{DepartureKind, NotificationPlan};

/// Work for a room worker.
#[derive(Debug)]
enum RoomCommand {
    /// Deliver every stage of a plan.
    Deliver(NotificationPlan),
    /// Exit if nothing else is queued by the time this is reached.
    Retire,
}

/// Queue of a live room worker.
#[derive(Debug)]
struct RoomQueue {
    /// Distinguishes successive workers of the same room.
    generation: u64,
    sender: mpsc::UnboundedSender<RoomCommand>,
}

/// Emits membership notifications in strict per-room order.
///
/// Each room with pending notifications owns a worker task fed by an
/// unbounded queue. The worker executes plans one at a time and sleeps the
/// configured stage delay before every paced stage. A worker removes its own
/// queue when it reaches a retire marker with nothing queued behind it, so a
/// room never has two workers delivering at once.
#[derive(Debug)]
pub struct PresenceNotifier {
    /// Delivery target.
    pool: Arc<ConnectionPool>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
    /// Pause before paced stages.
    stage_delay: Duration,
    /// Room ID → queue of the room's worker. Commands are only sent while
    /// holding the room's entry.
    queues: Arc<DashMap<RoomId, RoomQueue>>,
    /// Next worker generation.
    generations: AtomicU64,
}

impl PresenceNotifier {
    /// Creates a notifier delivering through `pool`.
    pub fn new(
        pool: Arc<ConnectionPool>,
        metrics: Arc<RealtimeMetrics>,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            pool,
            metrics,
            stage_delay: config.stage_delay(),
            queues: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Announce a fresh admission.
    pub fn announce_join(&self, snapshot: &MembershipSnapshot, joiner: &Participant) {
        self.enqueue(&snapshot.room_id, NotificationPlan::join(snapshot, joiner));
    }

    /// Announce a rejoin of the same room.
    pub fn announce_rejoin(
        &self,
        snapshot: &MembershipSnapshot,
        participant: &Participant,
        was_online: bool,
    ) {
        self.enqueue(
            &snapshot.room_id,
            NotificationPlan::rejoin(snapshot, participant, was_online),
        );
    }

    /// Announce a removal to the remaining members.
    pub fn announce_departure(
        &self,
        remaining: &MembershipSnapshot,
        departed: &Participant,
        kind: DepartureKind,
    ) {
        self.enqueue(
            &remaining.room_id,
            NotificationPlan::departure(remaining, departed, kind),
        );
    }

    /// Announce that a member went offline but keeps its seat.
    pub fn announce_offline(&self, snapshot: &MembershipSnapshot, participant: &ParticipantId) {
        self.enqueue(&snapshot.room_id, NotificationPlan::offline(snapshot, participant));
    }

    /// Announce updated capabilities to the other members.
    pub fn announce_ready(&self, snapshot: &MembershipSnapshot, participant: &Participant) {
        self.enqueue(&snapshot.room_id, NotificationPlan::ready(snapshot, participant));
    }

    /// Ask the worker of an emptied room to exit. Plans already queued are
    /// delivered first, and a plan queued after this keeps the worker alive.
    pub fn retire(&self, room_id: &RoomId) {
        if let Some(queue) = self.queues.get(room_id) {
            if queue.sender.send(RoomCommand::Retire).is_ok() {
                debug!(room_id = %room_id, "Retiring presence worker");
            }
        }
    }

    /// Retire every worker.
    pub fn retire_all(&self) {
        self.queues.clear();
    }

    /// Number of rooms with a live worker.
    pub fn active_rooms(&self) -> usize {
        self.queues.len()
    }

    fn enqueue(&self, room_id: &RoomId, plan: NotificationPlan) {
        if plan.is_empty() {
            return;
        }

        let mut queue = self
            .queues
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_worker(room_id.clone()));

        if let Err(mpsc::error::SendError(command)) = queue.sender.send(RoomCommand::Deliver(plan))
        {
            warn!(room_id = %room_id, "Presence worker gone, restarting");
            *queue = self.spawn_worker(room_id.clone());
            if queue.sender.send(command).is_err() {
                warn!(room_id = %room_id, "Presence plan dropped");
            }
        }
    }

    fn spawn_worker(&self, room_id: RoomId) -> RoomQueue {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (sender, commands) = mpsc::unbounded_channel();
        tokio::spawn(run_room_worker(RoomWorker {
            room_id,
            generation,
            commands,
            queues: Arc::clone(&self.queues),
            pool: Arc::clone(&self.pool),
            metrics: Arc::clone(&self.metrics),
            stage_delay: self.stage_delay,
        }));
        RoomQueue { generation, sender }
    }
}

struct RoomWorker {
    room_id: RoomId,
    generation: u64,
    commands: mpsc::UnboundedReceiver<RoomCommand>,
    queues: Arc<DashMap<RoomId, RoomQueue>>,
    pool: Arc<ConnectionPool>,
    metrics: Arc<RealtimeMetrics>,
    stage_delay: Duration,
}

async fn run_room_worker(mut worker: RoomWorker) {
    let room_id = worker.room_id.clone();
    debug!(room_id = %room_id, generation = worker.generation, "Presence worker started");
    while let Some(command) = worker.commands.recv().await {
        match command {
            RoomCommand::Deliver(plan) => {
                deliver_plan(
                    &room_id,
                    plan,
                    &worker.pool,
                    &worker.metrics,
                    worker.stage_delay,
                )
                .await;
            }
            RoomCommand::Retire => {
                let generation = worker.generation;
                let commands = &worker.commands;
                let retired = worker
                    .queues
                    .remove_if(&room_id, |_, queue| {
                        queue.generation == generation && commands.is_empty()
                    })
                    .is_some();
                if retired {
                    break;
                }
            }
        }
    }
    debug!(room_id = %room_id, "Presence worker stopped");
}

async fn deliver_plan(
    room_id: &RoomId,
    plan: NotificationPlan,
    pool: &ConnectionPool,
    metrics: &RealtimeMetrics,
    stage_delay: Duration,
) {
    for (index, stage) in plan.stages.into_iter().enumerate() {
        if index > 0 && stage.paced && !stage_delay.is_zero() {
            tokio::time::sleep(stage_delay).await;
        }

        let frame = match serialize_outbound(&stage.message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Failed to serialize presence stage");
                continue;
            }
        };

        let mut sent = 0u64;
        let mut dropped = 0u64;
        for conn_id in &stage.recipients {
            match pool.deliver(conn_id, frame.clone()) {
                Ok(()) => sent += 1,
                Err(failure) => {
                    dropped += 1;
                    debug!(
                        room_id = %room_id,
                        conn_id = %conn_id,
                        ?failure,
                        "Presence stage not delivered"
                    );
                }
            }
        }
        messages::record_sent(metrics, sent);
        messages::record_dropped(metrics, dropped);
    }
}

#[cfg(test)]
mod tests {
    use signalhub_core::types::ConnectionId;

    use super::*;
    use crate::connection::handle::ConnectionHandle;

    fn attach(pool: &ConnectionPool, name: &str) -> (Participant, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let pid = ParticipantId::parse(name).unwrap();
        let handle = Arc::new(ConnectionHandle::new(pid.clone(), tx));
        let participant = Participant::new(pid, handle.id, name.to_uppercase(), None);
        pool.add(handle);
        (participant, rx)
    }

    async fn next_type(rx: &mut mpsc::Receiver<String>) -> String {
        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_join_preserves_stage_order() {
        let pool = Arc::new(ConnectionPool::new());
        let notifier = PresenceNotifier::new(
            pool.clone(),
            Arc::new(RealtimeMetrics::new()),
            &PresenceConfig { stage_delay_ms: 500 },
        );
        let (a, mut rx_a) = attach(&pool, "a");
        let (b, mut rx_b) = attach(&pool, "b");
        let room = RoomId::parse("r1").unwrap();

        notifier.announce_join(&MembershipSnapshot::new(room.clone(), vec![a.clone()]), &a);
        notifier.announce_join(&MembershipSnapshot::new(room, vec![a, b.clone()]), &b);

        assert_eq!(next_type(&mut rx_a).await, "join-confirmation");
        assert_eq!(next_type(&mut rx_a).await, "existing-members");
        assert_eq!(next_type(&mut rx_a).await, "membership-updated");
        assert_eq!(next_type(&mut rx_a).await, "member-joined");
        assert_eq!(next_type(&mut rx_a).await, "membership-updated");

        assert_eq!(next_type(&mut rx_b).await, "join-confirmation");
        assert_eq!(next_type(&mut rx_b).await, "existing-members");
        assert_eq!(next_type(&mut rx_b).await, "membership-updated");
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_retire_drops_worker_after_queued_plans() {
        let pool = Arc::new(ConnectionPool::new());
        let notifier = PresenceNotifier::new(
            pool.clone(),
            Arc::new(RealtimeMetrics::new()),
            &PresenceConfig { stage_delay_ms: 0 },
        );
        let (a, mut rx_a) = attach(&pool, "a");
        let room = RoomId::parse("r1").unwrap();

        notifier.announce_join(&MembershipSnapshot::new(room.clone(), vec![a.clone()]), &a);
        assert_eq!(notifier.active_rooms(), 1);
        notifier.retire(&room);

        assert_eq!(next_type(&mut rx_a).await, "join-confirmation");
        settle().await;
        assert_eq!(notifier.active_rooms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_queued_behind_retire_keeps_single_worker() {
        let pool = Arc::new(ConnectionPool::new());
        let notifier = PresenceNotifier::new(
            pool.clone(),
            Arc::new(RealtimeMetrics::new()),
            &PresenceConfig { stage_delay_ms: 500 },
        );
        let (a, mut rx_a) = attach(&pool, "a");
        let (b, mut rx_b) = attach(&pool, "b");
        let room = RoomId::parse("r1").unwrap();

        notifier.announce_join(&MembershipSnapshot::new(room.clone(), vec![a.clone()]), &a);
        notifier.retire(&room);
        notifier.announce_join(&MembershipSnapshot::new(room.clone(), vec![a.clone(), b.clone()]), &b);
        assert_eq!(notifier.active_rooms(), 1);

        assert_eq!(next_type(&mut rx_a).await, "join-confirmation");
        assert_eq!(next_type(&mut rx_a).await, "existing-members");
        assert_eq!(next_type(&mut rx_a).await, "membership-updated");
        assert_eq!(next_type(&mut rx_a).await, "member-joined");
        assert_eq!(next_type(&mut rx_a).await, "membership-updated");
        assert_eq!(next_type(&mut rx_b).await, "join-confirmation");
        assert_eq!(notifier.active_rooms(), 1);
    }

    #[tokio::test]
    async fn test_plan_without_recipients_spawns_nothing() {
        let notifier = PresenceNotifier::new(
            Arc::new(ConnectionPool::new()),
            Arc::new(RealtimeMetrics::new()),
            &PresenceConfig { stage_delay_ms: 0 },
        );
        let gone = Participant::new(
            ParticipantId::parse("a").unwrap(),
            ConnectionId::new(),
            "A".to_string(),
            None,
        );
        let remaining = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![]);
        notifier.announce_departure(&remaining, &gone, DepartureKind::Left);
        assert_eq!(notifier.active_rooms(), 0);
    }
}
