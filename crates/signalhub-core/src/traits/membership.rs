//! Membership store trait for pluggable room storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::{Capabilities, ConnectionId, Participant, ParticipantId, RoomId};

/// Which family of store is backing membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// In-process, swept for staleness, lost on restart.
    Volatile,
    /// External, survives restart, reflects only connected participants.
    Durable,
}

/// How an [`Admission`] related to the participant's previous residency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionKind {
    /// The participant was not resident anywhere.
    Fresh,
    /// The participant was already resident in the same room and was updated
    /// in place (connection handle and profile, last write wins).
    Rejoined {
        /// Whether the replaced record was online.
        was_online: bool,
    },
    /// The participant was resident in another room and was removed from it
    /// within the same atomic operation.
    Moved {
        /// Room the participant was removed from.
        from: RoomId,
        /// The record removed from `from`.
        departed: Participant,
    },
}

/// Outcome of an atomic [`MembershipStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Stored record in the target room.
    pub participant: Participant,
    /// Relation to the previous residency.
    pub kind: AdmissionKind,
    /// Every member of the target room as of the same write.
    pub members: Vec<Participant>,
}

/// Outcome of a [`MembershipStore::remove`] that deleted a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The removed record.
    pub departed: Participant,
    /// Members left in the room as of the same write.
    pub remaining: Vec<Participant>,
}

/// Guard evaluated against the stored record inside the removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCondition {
    /// Remove whatever record is stored.
    Always,
    /// Remove only while this connection is the member's current one.
    Connection(ConnectionId),
    /// Remove only while the member has been inactive since before the cutoff.
    IdleBefore(DateTime<Utc>),
}

impl RemovalCondition {
    /// Whether `member` may be removed.
    pub fn admits(&self, member: &Participant) -> bool {
        match self {
            Self::Always => true,
            Self::Connection(connection_id) => member.connection_id == *connection_id,
            Self::IdleBefore(cutoff) => member.last_active_at < *cutoff,
        }
    }
}

/// Keyed storage for room membership.
///
/// Implementations must uphold three invariants: a participant is resident in
/// at most one room, every indexed connection belongs to a participant present
/// in the indexed room, and a room exists only while it has members.
#[async_trait]
pub trait MembershipStore: Send + Sync + std::fmt::Debug + 'static {
    /// Which family this store belongs to.
    fn mode(&self) -> StoreMode;

    /// Admit `participant` into `room_id`, atomically evicting any residency
    /// in another room and replacing any record in the same room. The
    /// returned membership is read within the same write.
    async fn upsert(&self, room_id: &RoomId, participant: Participant) -> AppResult<Admission>;

    /// Fetch one member.
    async fn get(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> AppResult<Option<Participant>>;

    /// All members of a room (empty if the room does not exist).
    async fn list(&self, room_id: &RoomId) -> AppResult<Vec<Participant>>;

    /// Remove a member if `condition` holds for the stored record, deleting
    /// the room when it becomes empty. Returns `None` if the member was absent
    /// or the condition failed.
    async fn remove(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        condition: RemovalCondition,
    ) -> AppResult<Option<Departure>>;

    /// Resolve a connection handle to its room and participant.
    async fn find_by_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>>;

    /// Whether the room has no members (or does not exist).
    async fn is_empty(&self, room_id: &RoomId) -> AppResult<bool>;

    /// Replace a member's capabilities. Returns the updated record.
    async fn set_capabilities(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        capabilities: Capabilities,
    ) -> AppResult<Option<Participant>>;

    /// Refresh `last_active_at` for the participant owning this connection.
    /// Returns `false` if the connection is not indexed.
    async fn touch(&self, connection_id: &ConnectionId) -> AppResult<bool>;

    /// Mark the participant owning this connection offline and restart its
    /// activity clock. A connection that has been superseded by a newer one
    /// resolves to nothing.
    async fn mark_offline(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>>;

    /// Members whose `last_active_at` is older than `cutoff`.
    async fn stale_since(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<(RoomId, ParticipantId)>>;

    /// Remove every membership record. Returns the number removed.
    async fn clear(&self) -> AppResult<u64>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn member() -> Participant {
        Participant::new(
            ParticipantId::parse("alice").unwrap(),
            ConnectionId::new(),
            "Alice".to_string(),
            None,
        )
    }

    #[test]
    fn test_connection_condition_rejects_superseded_handle() {
        let member = member();
        assert!(RemovalCondition::Connection(member.connection_id).admits(&member));
        assert!(!RemovalCondition::Connection(ConnectionId::new()).admits(&member));
    }

    #[test]
    fn test_idle_condition_spares_recent_activity() {
        let member = member();
        let earlier = member.last_active_at - Duration::seconds(1);
        let later = member.last_active_at + Duration::seconds(1);
        assert!(!RemovalCondition::IdleBefore(earlier).admits(&member));
        assert!(RemovalCondition::IdleBefore(later).admits(&member));
        assert!(RemovalCondition::Always.admits(&member));
    }
}
