//! Volatile membership store using dashmap.
//!
//! Three maps are kept in step: the residency index (participant to room),
//! the rooms themselves, and the connection index. Every mutation first
//! takes the participant's residency entry, which serialises concurrent
//! joins, leaves and moves of the same participant. Locks are always
//! acquired in the order residency, rooms, connections.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use signalhub_core::result::AppResult;
use signalhub_core::traits::{
    Admission, AdmissionKind, Departure, MembershipStore, RemovalCondition, StoreMode,
};
use signalhub_core::types::{Capabilities, ConnectionId, Participant, ParticipantId, RoomId};

/// Members of one room keyed by participant.
#[derive(Debug, Default)]
struct RoomRecord {
    members: HashMap<ParticipantId, Participant>,
}

/// In-process membership store.
#[derive(Debug, Default)]
pub struct VolatileMembershipStore {
    /// Which room each participant is resident in.
    residency: DashMap<ParticipantId, RoomId>,
    /// Room membership.
    rooms: DashMap<RoomId, RoomRecord>,
    /// Connection handle to (room, participant).
    connections: DashMap<ConnectionId, (RoomId, ParticipantId)>,
}

impl VolatileMembershipStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms currently holding at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Place a record into a room and index its connection.
    fn place(&self, room_id: &RoomId, participant: &Participant, replaced: Option<ConnectionId>) {
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .members
            .insert(participant.participant_id.clone(), participant.clone());

        if let Some(old) = replaced.filter(|old| *old != participant.connection_id) {
            self.connections.remove(&old);
        }
        self.connections.insert(
            participant.connection_id,
            (room_id.clone(), participant.participant_id.clone()),
        );
    }

    /// Remove a record from a room, dropping the room if it empties.
    /// The caller must hold the participant's residency entry.
    fn detach(&self, room_id: &RoomId, participant_id: &ParticipantId) -> Option<Participant> {
        let removed = self
            .rooms
            .get_mut(room_id)
            .and_then(|mut room| room.members.remove(participant_id));

        self.rooms
            .remove_if(room_id, |_, room| room.members.is_empty());

        if let Some(participant) = &removed {
            self.connections
                .remove_if(&participant.connection_id, |_, (room, pid)| {
                    room == room_id && pid == participant_id
                });
        }
        removed
    }

    /// Every member of a room.
    fn members_of(&self, room_id: &RoomId) -> Vec<Participant> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.values().cloned().collect())
            .unwrap_or_default()
    }

    fn admit(&self, room_id: &RoomId, mut participant: Participant) -> Admission {
        let kind = match self.residency.entry(participant.participant_id.clone()) {
            Entry::Vacant(slot) => {
                let _residency = slot.insert(room_id.clone());
                self.place(room_id, &participant, None);
                AdmissionKind::Fresh
            }
            Entry::Occupied(slot) if slot.get() == room_id => {
                let previous = self
                    .rooms
                    .get(room_id)
                    .and_then(|room| room.members.get(&participant.participant_id).cloned());

                match previous {
                    Some(previous) => {
                        participant.joined_at = previous.joined_at;
                        participant.capabilities = previous.capabilities;
                        self.place(room_id, &participant, Some(previous.connection_id));
                        AdmissionKind::Rejoined {
                            was_online: previous.online,
                        }
                    }
                    None => {
                        self.place(room_id, &participant, None);
                        AdmissionKind::Fresh
                    }
                }
            }
            Entry::Occupied(mut slot) => {
                let from = slot.get().clone();
                let departed = self.detach(&from, &participant.participant_id);
                slot.insert(room_id.clone());
                self.place(room_id, &participant, None);

                match departed {
                    Some(departed) => {
                        debug!(
                            participant = %participant.participant_id,
                            from = %from,
                            to = %room_id,
                            "Moved participant between rooms"
                        );
                        AdmissionKind::Moved { from, departed }
                    }
                    None => AdmissionKind::Fresh,
                }
            }
        };

        Admission {
            members: self.members_of(room_id),
            participant,
            kind,
        }
    }

    fn owner_of(&self, connection_id: &ConnectionId) -> Option<(RoomId, ParticipantId)> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Apply `update` to the member owning `connection_id`, provided that
    /// connection is still the member's current one.
    fn with_current_member(
        &self,
        connection_id: &ConnectionId,
        update: impl FnOnce(&mut Participant),
    ) -> Option<(RoomId, ParticipantId)> {
        let (room_id, participant_id) = self.owner_of(connection_id)?;
        let mut room = self.rooms.get_mut(&room_id)?;
        let member = room.members.get_mut(&participant_id)?;
        if member.connection_id != *connection_id {
            return None;
        }
        update(member);
        Some((room_id, participant_id))
    }
}

#[async_trait]
impl MembershipStore for VolatileMembershipStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Volatile
    }

    async fn upsert(&self, room_id: &RoomId, participant: Participant) -> AppResult<Admission> {
        Ok(self.admit(room_id, participant))
    }

    async fn get(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> AppResult<Option<Participant>> {
        Ok(self
            .rooms
            .get(room_id)
            .and_then(|room| room.members.get(participant_id).cloned()))
    }

    async fn list(&self, room_id: &RoomId) -> AppResult<Vec<Participant>> {
        Ok(self.members_of(room_id))
    }

    async fn remove(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        condition: RemovalCondition,
    ) -> AppResult<Option<Departure>> {
        let Entry::Occupied(slot) = self.residency.entry(participant_id.clone()) else {
            return Ok(None);
        };
        if slot.get() != room_id {
            return Ok(None);
        }

        let admitted = self
            .rooms
            .get(room_id)
            .and_then(|room| room.members.get(participant_id).map(|m| condition.admits(m)))
            .unwrap_or(false);
        if !admitted {
            return Ok(None);
        }

        let departed = self.detach(room_id, participant_id);
        slot.remove();
        Ok(departed.map(|departed| Departure {
            departed,
            remaining: self.members_of(room_id),
        }))
    }

    async fn find_by_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>> {
        Ok(self.owner_of(connection_id))
    }

    async fn is_empty(&self, room_id: &RoomId) -> AppResult<bool> {
        Ok(self
            .rooms
            .get(room_id)
            .is_none_or(|room| room.members.is_empty()))
    }

    async fn set_capabilities(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        capabilities: Capabilities,
    ) -> AppResult<Option<Participant>> {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return Ok(None);
        };
        Ok(room.members.get_mut(participant_id).map(|member| {
            member.capabilities = capabilities;
            member.clone()
        }))
    }

    async fn touch(&self, connection_id: &ConnectionId) -> AppResult<bool> {
        let now = Utc::now();
        Ok(self
            .with_current_member(connection_id, |member| member.last_active_at = now)
            .is_some())
    }

    async fn mark_offline(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>> {
        let now = Utc::now();
        Ok(self.with_current_member(connection_id, |member| {
            member.online = false;
            member.last_active_at = now;
        }))
    }

    async fn stale_since(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<(RoomId, ParticipantId)>> {
        let mut stale = Vec::new();
        for room in self.rooms.iter() {
            for member in room.members.values() {
                if member.last_active_at < cutoff {
                    stale.push((room.key().clone(), member.participant_id.clone()));
                }
            }
        }
        Ok(stale)
    }

    async fn clear(&self) -> AppResult<u64> {
        let removed = self.residency.len() as u64;
        self.residency.clear();
        self.rooms.clear();
        self.connections.clear();
        Ok(removed)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;

    fn room(name: &str) -> RoomId {
        RoomId::parse(name).unwrap()
    }

    fn pid(name: &str) -> ParticipantId {
        ParticipantId::parse(name).unwrap()
    }

    fn participant(name: &str) -> Participant {
        Participant::new(pid(name), ConnectionId::new(), name.to_uppercase(), None)
    }

    #[tokio::test]
    async fn test_fresh_join_indexes_connection() {
        let store = VolatileMembershipStore::new();
        let alice = participant("alice");
        let conn = alice.connection_id;

        let admission = store.upsert(&room("r1"), alice).await.unwrap();
        assert_eq!(admission.kind, AdmissionKind::Fresh);
        assert_eq!(admission.members.len(), 1);
        assert_eq!(
            store.find_by_connection(&conn).await.unwrap(),
            Some((room("r1"), pid("alice")))
        );
        assert!(!store.is_empty(&room("r1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejoin_replaces_connection_and_keeps_join_time() {
        let store = VolatileMembershipStore::new();
        let first = participant("alice");
        let first_conn = first.connection_id;
        let joined_at = first.joined_at;
        store.upsert(&room("r1"), first).await.unwrap();
        store.mark_offline(&first_conn).await.unwrap();

        let second = participant("alice");
        let second_conn = second.connection_id;
        let admission = store.upsert(&room("r1"), second).await.unwrap();

        assert_eq!(admission.kind, AdmissionKind::Rejoined { was_online: false });
        assert!(admission.participant.online);
        assert_eq!(admission.participant.connection_id, second_conn);
        assert_eq!(admission.participant.joined_at, joined_at);
        assert_eq!(admission.members, vec![admission.participant.clone()]);
        assert_eq!(store.list(&room("r1")).await.unwrap().len(), 1);
        assert!(store.find_by_connection(&first_conn).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_elsewhere_moves_participant() {
        let store = VolatileMembershipStore::new();
        let alice = participant("alice");
        store.upsert(&room("r1"), alice).await.unwrap();

        let admission = store
            .upsert(&room("r2"), participant("alice"))
            .await
            .unwrap();
        match admission.kind {
            AdmissionKind::Moved { from, departed } => {
                assert_eq!(from, room("r1"));
                assert_eq!(departed.participant_id, pid("alice"));
            }
            other => panic!("expected move, got {other:?}"),
        }
        assert!(store.is_empty(&room("r1")).await.unwrap());
        assert_eq!(store.room_count(), 1);
        assert!(store.get(&room("r2"), &pid("alice")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_last_member_deletes_room() {
        let store = VolatileMembershipStore::new();
        let alice = participant("alice");
        let conn = alice.connection_id;
        store.upsert(&room("r1"), alice).await.unwrap();

        let removed = store
            .remove(&room("r1"), &pid("alice"), RemovalCondition::Always)
            .await
            .unwrap()
            .unwrap();
        assert!(removed.remaining.is_empty());
        assert_eq!(store.room_count(), 0);
        assert!(store.find_by_connection(&conn).await.unwrap().is_none());

        let again = store
            .remove(&room("r1"), &pid("alice"), RemovalCondition::Always)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_remove_from_wrong_room_is_noop() {
        let store = VolatileMembershipStore::new();
        store.upsert(&room("r1"), participant("alice")).await.unwrap();

        assert!(store
            .remove(&room("r2"), &pid("alice"), RemovalCondition::Always)
            .await
            .unwrap()
            .is_none());
        assert!(store.get(&room("r1"), &pid("alice")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_reports_remaining_members() {
        let store = VolatileMembershipStore::new();
        store.upsert(&room("r1"), participant("alice")).await.unwrap();
        store.upsert(&room("r1"), participant("bob")).await.unwrap();

        let departure = store
            .remove(&room("r1"), &pid("alice"), RemovalCondition::Always)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(departure.departed.participant_id, pid("alice"));
        assert_eq!(departure.remaining.len(), 1);
        assert_eq!(departure.remaining[0].participant_id, pid("bob"));
    }

    #[tokio::test]
    async fn test_remove_for_superseded_connection_keeps_member() {
        let store = VolatileMembershipStore::new();
        let first = participant("alice");
        let first_conn = first.connection_id;
        store.upsert(&room("r1"), first).await.unwrap();
        let second = participant("alice");
        let second_conn = second.connection_id;
        store.upsert(&room("r1"), second).await.unwrap();

        let stale = store
            .remove(&room("r1"), &pid("alice"), RemovalCondition::Connection(first_conn))
            .await
            .unwrap();
        assert!(stale.is_none());
        assert!(store.find_by_connection(&second_conn).await.unwrap().is_some());

        let current = store
            .remove(&room("r1"), &pid("alice"), RemovalCondition::Connection(second_conn))
            .await
            .unwrap();
        assert!(current.is_some());
        assert_eq!(store.room_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_removal_spares_refreshed_member() {
        let store = VolatileMembershipStore::new();
        let mut alice = participant("alice");
        alice.last_active_at -= Duration::seconds(120);
        let conn = alice.connection_id;
        store.upsert(&room("r1"), alice).await.unwrap();
        let cutoff = Utc::now() - Duration::seconds(60);

        store.touch(&conn).await.unwrap();

        let removed = store
            .remove(&room("r1"), &pid("alice"), RemovalCondition::IdleBefore(cutoff))
            .await
            .unwrap();
        assert!(removed.is_none());
        assert!(store.get(&room("r1"), &pid("alice")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_superseded_connection_cannot_mark_offline() {
        let store = VolatileMembershipStore::new();
        let first = participant("alice");
        let first_conn = first.connection_id;
        store.upsert(&room("r1"), first).await.unwrap();
        store.upsert(&room("r1"), participant("alice")).await.unwrap();

        assert!(store.mark_offline(&first_conn).await.unwrap().is_none());
        let member = store.get(&room("r1"), &pid("alice")).await.unwrap().unwrap();
        assert!(member.online);
    }

    #[tokio::test]
    async fn test_stale_since_reports_inactive_members() {
        let store = VolatileMembershipStore::new();
        let mut old = participant("old");
        old.last_active_at -= Duration::seconds(120);
        store.upsert(&room("r1"), old).await.unwrap();
        store.upsert(&room("r1"), participant("fresh")).await.unwrap();

        let stale = store
            .stale_since(Utc::now() - Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(stale, vec![(room("r1"), pid("old"))]);
    }

    #[tokio::test]
    async fn test_touch_refreshes_activity() {
        let store = VolatileMembershipStore::new();
        let mut alice = participant("alice");
        alice.last_active_at -= Duration::seconds(120);
        let conn = alice.connection_id;
        store.upsert(&room("r1"), alice).await.unwrap();

        assert!(store.touch(&conn).await.unwrap());
        assert!(!store.touch(&ConnectionId::new()).await.unwrap());
        let stale = store
            .stale_since(Utc::now() - Duration::seconds(60))
            .await
            .unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn test_set_capabilities_updates_member() {
        let store = VolatileMembershipStore::new();
        store.upsert(&room("r1"), participant("alice")).await.unwrap();
        let caps = Capabilities {
            video: Some(true),
            audio: Some(false),
            bandwidth: None,
        };

        let updated = store
            .set_capabilities(&room("r1"), &pid("alice"), caps.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.capabilities, caps);
        assert!(store
            .set_capabilities(&room("r1"), &pid("bob"), caps)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_clear_counts_members() {
        let store = VolatileMembershipStore::new();
        store.upsert(&room("r1"), participant("a")).await.unwrap();
        store.upsert(&room("r2"), participant("b")).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.room_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_keep_single_residency() {
        let store = Arc::new(VolatileMembershipStore::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let target = room(&format!("r{}", i % 4));
                store.upsert(&target, participant("alice")).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut found = 0;
        for i in 0..4 {
            found += store.list(&room(&format!("r{i}"))).await.unwrap().len();
        }
        assert_eq!(found, 1);
        assert_eq!(store.room_count(), 1);
    }
}
