//! Participant model shared by the store, room logic and wire protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ConnectionId, ParticipantId, RoomId};

/// Media capabilities a participant announces once ready.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Video enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
    /// Audio enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    /// Free-form bandwidth hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
}

/// Display profile supplied with `join-room`; blanks fall back to the profile directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar reference (URL or storage key).
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

impl Profile {
    /// Fill missing or blank fields from `fallback`.
    pub fn or(self, fallback: Profile) -> Profile {
        Profile {
            display_name: non_blank(self.display_name).or(non_blank(fallback.display_name)),
            avatar_ref: non_blank(self.avatar_ref).or(non_blank(fallback.avatar_ref)),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A member of exactly one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identity.
    pub participant_id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Avatar reference.
    pub avatar_ref: Option<String>,
    /// Announced media capabilities.
    pub capabilities: Capabilities,
    /// Current transport handle.
    pub connection_id: ConnectionId,
    /// False while in the disconnected grace window.
    pub online: bool,
    /// Last inbound activity.
    pub last_active_at: DateTime<Utc>,
    /// When the participant entered the current room.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Build a freshly connected participant.
    pub fn new(
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        display_name: String,
        avatar_ref: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            participant_id,
            display_name,
            avatar_ref,
            capabilities: Capabilities::default(),
            connection_id,
            online: true,
            last_active_at: now,
            joined_at: now,
        }
    }

    /// Wire projection without the transport handle.
    pub fn view(&self) -> MemberView {
        MemberView {
            participant_id: self.participant_id.clone(),
            display_name: self.display_name.clone(),
            avatar_ref: self.avatar_ref.clone(),
            capabilities: self.capabilities.clone(),
            online: self.online,
        }
    }
}

/// What other clients see of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    /// Stable identity.
    pub participant_id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    /// Announced media capabilities.
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Whether the participant currently holds a live connection.
    pub online: bool,
}

/// The full membership of a room at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    /// Room the snapshot describes.
    pub room_id: RoomId,
    /// Members ordered by `(joined_at, participant_id)`.
    pub members: Vec<Participant>,
}

impl MembershipSnapshot {
    /// Build a snapshot, imposing the canonical member order.
    pub fn new(room_id: RoomId, mut members: Vec<Participant>) -> Self {
        members.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        Self { room_id, members }
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Look up one member.
    pub fn get(&self, participant_id: &ParticipantId) -> Option<&Participant> {
        self.members
            .iter()
            .find(|p| &p.participant_id == participant_id)
    }

    /// Wire views of every member.
    pub fn views(&self) -> Vec<MemberView> {
        self.members.iter().map(Participant::view).collect()
    }

    /// Wire views of every member except `excluded`.
    pub fn views_excluding(&self, excluded: &ParticipantId) -> Vec<MemberView> {
        self.members
            .iter()
            .filter(|p| &p.participant_id != excluded)
            .map(Participant::view)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn participant(id: &str, offset_secs: i64) -> Participant {
        let mut p = Participant::new(
            ParticipantId::parse(id).unwrap(),
            ConnectionId::new(),
            id.to_uppercase(),
            None,
        );
        p.joined_at += Duration::seconds(offset_secs);
        p
    }

    #[test]
    fn test_profile_or_prefers_non_blank_supplied_values() {
        let supplied = Profile {
            display_name: Some("  ".to_string()),
            avatar_ref: Some("a.png".to_string()),
        };
        let fallback = Profile {
            display_name: Some("Alice".to_string()),
            avatar_ref: Some("default.png".to_string()),
        };
        let merged = supplied.or(fallback);
        assert_eq!(merged.display_name.as_deref(), Some("Alice"));
        assert_eq!(merged.avatar_ref.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_snapshot_orders_by_join_time() {
        let snapshot = MembershipSnapshot::new(
            RoomId::parse("r1").unwrap(),
            vec![participant("b", 5), participant("a", 10), participant("c", 0)],
        );
        let order: Vec<&str> = snapshot
            .members
            .iter()
            .map(|p| p.participant_id.as_str())
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_view_hides_connection_id() {
        let p = participant("a", 0);
        let json = serde_json::to_value(p.view()).unwrap();
        assert_eq!(json["participantId"], "a");
        assert_eq!(json["displayName"], "A");
        assert!(json.get("connectionId").is_none());
    }
}
