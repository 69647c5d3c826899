//! Room manager — join, leave, reconnect and reclaim against the membership store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use signalhub_core::error::AppError;
use signalhub_core::result::AppResult;
use signalhub_core::traits::{
    Admission, AdmissionKind, Departure, MembershipStore, ProfileDirectory, RemovalCondition,
    StoreMode,
};
use signalhub_core::types::{
    Capabilities, ConnectionId, MembershipSnapshot, Participant, ParticipantId, Profile, RoomId,
};

use crate::metrics::{RealtimeMetrics, rooms};
use crate::presence::{DepartureKind, PresenceNotifier};

/// What happens to a participant whose transport drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectPolicy {
    /// Keep the seat offline until the liveness sweep reclaims it.
    Grace,
    /// Remove the participant at once.
    Immediate,
}

impl DisconnectPolicy {
    /// The policy matching a store family.
    pub fn for_mode(mode: StoreMode) -> Self {
        match mode {
            StoreMode::Volatile => Self::Grace,
            StoreMode::Durable => Self::Immediate,
        }
    }
}

/// Orchestrates membership changes and hands the resulting snapshots to the
/// presence notifier.
///
/// Every change to a room runs under that room's lock, from the store write
/// through enqueueing its notifications, so plans reach the room worker in
/// the order the writes happened and each carries the membership its write
/// produced. No task holds two room locks at once.
#[derive(Debug)]
pub struct RoomManager {
    /// Membership store.
    store: Arc<dyn MembershipStore>,
    /// Source of default display fields.
    profiles: Arc<dyn ProfileDirectory>,
    /// Presence broadcast.
    notifier: Arc<PresenceNotifier>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
    /// Upper bound on every store call.
    store_timeout: Duration,
    /// Room ID → lock serialising that room's changes.
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

/// Held while changing one room. Dropping it forgets the room's mutex once
/// nobody else holds or awaits it.
struct RoomGuard<'a> {
    locks: &'a DashMap<RoomId, Arc<Mutex<()>>>,
    room_id: RoomId,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        self.locks
            .remove_if(&self.room_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl RoomManager {
    /// Creates a room manager.
    pub fn new(
        store: Arc<dyn MembershipStore>,
        profiles: Arc<dyn ProfileDirectory>,
        notifier: Arc<PresenceNotifier>,
        metrics: Arc<RealtimeMetrics>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            profiles,
            notifier,
            metrics,
            store_timeout,
            room_locks: DashMap::new(),
        }
    }

    /// Admit a participant into a room.
    ///
    /// A participant resident in another room is moved out of it and that
    /// room is told once the join has been announced. Joining the room the
    /// participant is already in replaces its connection in place. Returns
    /// the post-join membership.
    pub async fn join(
        &self,
        participant_id: ParticipantId,
        room_id: RoomId,
        connection_id: ConnectionId,
        profile: Profile,
    ) -> AppResult<MembershipSnapshot> {
        let profile = profile.or(self.directory_profile(&participant_id).await);
        let display_name = profile
            .display_name
            .unwrap_or_else(|| participant_id.to_string());
        let candidate = Participant::new(
            participant_id.clone(),
            connection_id,
            display_name,
            profile.avatar_ref,
        );
        let written_at = candidate.joined_at;

        let room = self.lock_room(&room_id).await;
        let admission = match self
            .bounded("upsert", self.store.upsert(&room_id, candidate))
            .await
        {
            Ok(admission) => admission,
            Err(e) => {
                self.abandon_join(&room_id, &participant_id, connection_id, written_at)
                    .await;
                return Err(e);
            }
        };
        rooms::record_join(&self.metrics);

        let Admission {
            participant,
            kind,
            members,
        } = admission;
        let snapshot = MembershipSnapshot::new(room_id.clone(), members);

        let moved_from = match kind {
            AdmissionKind::Fresh => {
                info!(
                    room_id = %room_id,
                    participant_id = %participant.participant_id,
                    members = snapshot.members.len(),
                    "Participant joined room"
                );
                self.notifier.announce_join(&snapshot, &participant);
                None
            }
            AdmissionKind::Rejoined { was_online } => {
                info!(
                    room_id = %room_id,
                    participant_id = %participant.participant_id,
                    was_online,
                    "Participant rejoined room"
                );
                self.notifier
                    .announce_rejoin(&snapshot, &participant, was_online);
                None
            }
            AdmissionKind::Moved { from, departed } => {
                info!(
                    room_id = %room_id,
                    from = %from,
                    participant_id = %participant.participant_id,
                    "Participant moved rooms"
                );
                rooms::record_departure(&self.metrics);
                self.notifier.announce_join(&snapshot, &participant);
                Some((from, departed))
            }
        };
        drop(room);

        if let Some((from, departed)) = moved_from {
            self.announce_move_out(&from, &departed).await;
        }
        Ok(snapshot)
    }

    /// Remove a participant after an explicit leave.
    ///
    /// Returns `false` when the participant was already absent.
    pub async fn leave(&self, participant_id: &ParticipantId, room_id: &RoomId) -> AppResult<bool> {
        self.depart(
            participant_id,
            room_id,
            RemovalCondition::Always,
            DepartureKind::Left,
        )
        .await
    }

    /// Remove a participant whose connection was lost or went stale, provided
    /// `condition` still holds for its stored record.
    ///
    /// Returns `false` when the participant was absent or the condition failed.
    pub async fn reclaim(
        &self,
        participant_id: &ParticipantId,
        room_id: &RoomId,
        condition: RemovalCondition,
    ) -> AppResult<bool> {
        self.depart(participant_id, room_id, condition, DepartureKind::Disconnected)
            .await
    }

    /// React to a closed transport.
    pub async fn disconnect(
        &self,
        connection_id: &ConnectionId,
        policy: DisconnectPolicy,
    ) -> AppResult<()> {
        match policy {
            DisconnectPolicy::Immediate => {
                let Some((room_id, participant_id)) = self.resolve_connection(connection_id).await?
                else {
                    return Ok(());
                };
                // A newer connection of the same participant keeps the seat.
                self.reclaim(
                    &participant_id,
                    &room_id,
                    RemovalCondition::Connection(*connection_id),
                )
                .await?;
                Ok(())
            }
            DisconnectPolicy::Grace => {
                let Some((room_id, participant_id)) = self
                    .bounded("mark_offline", self.store.mark_offline(connection_id))
                    .await?
                else {
                    return Ok(());
                };
                debug!(
                    room_id = %room_id,
                    participant_id = %participant_id,
                    conn_id = %connection_id,
                    "Participant offline, seat held until reclaimed"
                );
                let _room = self.lock_room(&room_id).await;
                let snapshot = self.snapshot(&room_id).await?;
                self.notifier.announce_offline(&snapshot, &participant_id);
                Ok(())
            }
        }
    }

    /// Record announced capabilities and tell the other members.
    pub async fn mark_ready(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        capabilities: Capabilities,
    ) -> AppResult<Participant> {
        let participant = self
            .bounded(
                "set_capabilities",
                self.store
                    .set_capabilities(room_id, participant_id, capabilities),
            )
            .await?
            .ok_or_else(|| {
                AppError::validation(format!(
                    "participant '{participant_id}' has not joined room '{room_id}'"
                ))
            })?;
        self.touch(connection_id).await?;

        let _room = self.lock_room(room_id).await;
        let snapshot = self.snapshot(room_id).await?;
        self.notifier.announce_ready(&snapshot, &participant);
        Ok(participant)
    }

    /// Refresh the activity clock of the participant on this connection.
    pub async fn touch(&self, connection_id: &ConnectionId) -> AppResult<bool> {
        self.bounded("touch", self.store.touch(connection_id))
            .await
    }

    /// Resolve a connection to its room and participant.
    pub async fn resolve_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>> {
        self.bounded(
            "find_by_connection",
            self.store.find_by_connection(connection_id),
        )
        .await
    }

    /// Fetch one member of a room.
    pub async fn member(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> AppResult<Option<Participant>> {
        self.bounded("get", self.store.get(room_id, participant_id))
            .await
    }

    /// Current membership of a room.
    pub async fn snapshot(&self, room_id: &RoomId) -> AppResult<MembershipSnapshot> {
        let members = self.bounded("list", self.store.list(room_id)).await?;
        Ok(MembershipSnapshot::new(room_id.clone(), members))
    }

    /// Participants inactive since `cutoff`.
    pub async fn stale_participants(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<(RoomId, ParticipantId)>> {
        self.bounded("stale_since", self.store.stale_since(cutoff))
            .await
    }

    async fn depart(
        &self,
        participant_id: &ParticipantId,
        room_id: &RoomId,
        condition: RemovalCondition,
        kind: DepartureKind,
    ) -> AppResult<bool> {
        let _room = self.lock_room(room_id).await;
        let Some(Departure {
            departed,
            remaining,
        }) = self
            .bounded(
                "remove",
                self.store.remove(room_id, participant_id, condition),
            )
            .await?
        else {
            debug!(
                room_id = %room_id,
                participant_id = %participant_id,
                ?condition,
                "Participant already absent or superseded"
            );
            return Ok(false);
        };

        info!(
            room_id = %room_id,
            participant_id = %participant_id,
            ?kind,
            "Participant left room"
        );
        rooms::record_departure(&self.metrics);
        let remaining = MembershipSnapshot::new(room_id.clone(), remaining);
        self.notifier.announce_departure(&remaining, &departed, kind);
        if remaining.is_empty() {
            self.notifier.retire(room_id);
        }
        Ok(true)
    }

    /// Tell the room a participant moved out of about the move. The store
    /// already removed the record; the remaining members are read under the
    /// room's lock so the plan reflects every earlier change to that room.
    async fn announce_move_out(&self, room_id: &RoomId, departed: &Participant) {
        let _room = self.lock_room(room_id).await;
        match self.snapshot(room_id).await {
            Ok(remaining) => {
                self.notifier
                    .announce_departure(&remaining, departed, DepartureKind::Left);
                if remaining.is_empty() {
                    self.notifier.retire(room_id);
                }
            }
            Err(e) => warn!(
                room_id = %room_id,
                participant_id = %departed.participant_id,
                error = %e,
                "Failed to load remaining members, departure not announced"
            ),
        }
    }

    /// Undo whatever a failed upsert may have committed for this connection.
    /// A timed-out write can still land, and leaving it behind would turn the
    /// client's retry into a silent rejoin. Peers are told only when the
    /// removed record predates this join, since a fresh one was never announced.
    async fn abandon_join(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        connection_id: ConnectionId,
        written_at: DateTime<Utc>,
    ) {
        let removal = self
            .bounded(
                "remove",
                self.store.remove(
                    room_id,
                    participant_id,
                    RemovalCondition::Connection(connection_id),
                ),
            )
            .await;

        match removal {
            Ok(None) => {}
            Ok(Some(Departure {
                departed,
                remaining,
            })) => {
                warn!(
                    room_id = %room_id,
                    participant_id = %participant_id,
                    "Rolled back membership written by a failed join"
                );
                let remaining = MembershipSnapshot::new(room_id.clone(), remaining);
                // Stores may truncate timestamps to microseconds.
                if departed.joined_at.timestamp_micros() != written_at.timestamp_micros() {
                    self.notifier
                        .announce_departure(&remaining, &departed, DepartureKind::Left);
                }
                if remaining.is_empty() {
                    self.notifier.retire(room_id);
                }
            }
            Err(e) => warn!(
                room_id = %room_id,
                participant_id = %participant_id,
                error = %e,
                "Failed to roll back membership after a failed join"
            ),
        }
    }

    async fn lock_room(&self, room_id: &RoomId) -> RoomGuard<'_> {
        let lock = self
            .room_locks
            .entry(room_id.clone())
            .or_default()
            .value()
            .clone();
        RoomGuard {
            locks: &self.room_locks,
            room_id: room_id.clone(),
            held: Some(lock.lock_owned().await),
        }
    }

    async fn directory_profile(&self, participant_id: &ParticipantId) -> Profile {
        match self
            .bounded("profile lookup", self.profiles.lookup(participant_id))
            .await
        {
            Ok(profile) => profile.unwrap_or_default(),
            Err(e) => {
                warn!(participant_id = %participant_id, error = %e, "Profile lookup failed");
                Profile::default()
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                rooms::record_store_timeout(&self.metrics);
                Err(AppError::store_unavailable(format!(
                    "membership store timed out during {operation}"
                )))
            }
        }
    }
}
