//! Inbound and outbound WebSocket message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use signalhub_core::types::{Capabilities, MemberView, ParticipantId, Profile, RoomId};

use super::payload::SignalPayload;

/// The three negotiation message kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// Session description offer.
    Offer,
    /// Session description answer.
    Answer,
    /// Connectivity candidate.
    IceCandidate,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offer => write!(f, "offer"),
            Self::Answer => write!(f, "answer"),
            Self::IceCandidate => write!(f, "ice-candidate"),
        }
    }
}

/// A validated message received from a client.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Enter a room (moving out of any other room).
    JoinRoom {
        /// Target room.
        room: RoomId,
        /// Claimed identity; must match the authenticated participant.
        participant_id: ParticipantId,
        /// Display fields; blanks are filled from the profile directory.
        profile: Profile,
    },
    /// Leave a room.
    LeaveRoom {
        /// Room being left.
        room: RoomId,
        /// Claimed identity; must match the authenticated participant.
        participant_id: ParticipantId,
    },
    /// Forward a negotiation payload to one peer.
    Signal {
        /// Offer, answer or ICE candidate.
        kind: SignalKind,
        /// Room shared by both peers.
        room: RoomId,
        /// Addressed peer.
        to: ParticipantId,
        /// Opaque payload.
        payload: SignalPayload,
    },
    /// Announce media capabilities.
    PresenceReady {
        /// Room the participant is in.
        room: RoomId,
        /// Claimed identity; must match the authenticated participant.
        participant_id: ParticipantId,
        /// Announced capabilities.
        capabilities: Capabilities,
    },
    /// Keepalive.
    LivenessPing,
}

/// Action carried by `membership-updated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipAction {
    /// A participant was admitted or came back online.
    Join,
    /// A participant left explicitly.
    Leave,
    /// A participant lost its connection or was reclaimed.
    Disconnect,
}

/// Display metadata of the sender attached to relayed signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    /// Sender display name.
    pub display_name: String,
    /// Sender avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
}

/// A negotiation message addressed to one peer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignal {
    /// Room shared by both peers.
    pub room: RoomId,
    /// Sending participant.
    pub from: ParticipantId,
    /// Addressed participant.
    pub to: ParticipantId,
    /// Opaque payload, forwarded unmodified.
    pub payload: SignalPayload,
    /// Sender display metadata.
    pub sender: SenderInfo,
    /// When the server forwarded the signal.
    pub timestamp: DateTime<Utc>,
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Admission acknowledged (joiner only).
    JoinConfirmation {
        /// Room joined.
        room: RoomId,
        /// The joiner as others see it.
        user: MemberView,
    },
    /// Who was already present (joiner only, joiner excluded).
    ExistingMembers {
        /// Room joined.
        room: RoomId,
        /// Present members.
        users: Vec<MemberView>,
    },
    /// A new participant entered the room.
    MemberJoined {
        /// Room.
        room: RoomId,
        /// The newcomer.
        user: MemberView,
    },
    /// Full membership after a change.
    MembershipUpdated {
        /// Room.
        room: RoomId,
        /// What changed.
        action: MembershipAction,
        /// Every member after the change.
        users: Vec<MemberView>,
        /// When the change was announced.
        timestamp: DateTime<Utc>,
    },
    /// A participant left explicitly.
    MemberLeft {
        /// Room.
        room: RoomId,
        /// The departed participant.
        user: MemberView,
        /// When the departure was announced.
        timestamp: DateTime<Utc>,
    },
    /// A participant lost its connection and was removed.
    MemberDisconnected {
        /// Room.
        room: RoomId,
        /// The departed participant.
        user: MemberView,
        /// When the departure was announced.
        timestamp: DateTime<Utc>,
    },
    /// A participant announced its capabilities.
    MemberReady {
        /// Room.
        room: RoomId,
        /// Ready participant.
        participant_id: ParticipantId,
        /// Announced capabilities.
        capabilities: Capabilities,
    },
    /// Relayed offer.
    Offer(RelayedSignal),
    /// Relayed answer.
    Answer(RelayedSignal),
    /// Relayed ICE candidate.
    IceCandidate(RelayedSignal),
    /// Keepalive reply.
    LivenessPong {
        /// Server time in milliseconds since the epoch.
        timestamp: i64,
    },
    /// A request from this connection failed.
    Error {
        /// Machine-readable error code.
        code: String,
        /// Error description.
        message: String,
    },
}

impl OutboundMessage {
    /// Wrap a relayed signal in the variant matching its kind.
    pub fn signal(kind: SignalKind, signal: RelayedSignal) -> Self {
        match kind {
            SignalKind::Offer => Self::Offer(signal),
            SignalKind::Answer => Self::Answer(signal),
            SignalKind::IceCandidate => Self::IceCandidate(signal),
        }
    }

    /// Build an error frame from an application error.
    pub fn error(err: &signalhub_core::AppError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::value::RawValue;

    use super::*;
    use signalhub_core::AppError;

    #[test]
    fn test_outbound_uses_kebab_type_and_camel_fields() {
        let msg = OutboundMessage::MemberReady {
            room: RoomId::parse("r1").unwrap(),
            participant_id: ParticipantId::parse("alice").unwrap(),
            capabilities: Capabilities {
                video: Some(true),
                audio: None,
                bandwidth: None,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "member-ready");
        assert_eq!(json["participantId"], "alice");
        assert_eq!(json["capabilities"]["video"], true);
    }

    #[test]
    fn test_relayed_signal_keeps_payload_and_kind() {
        let payload = SignalPayload::new(
            RawValue::from_string(r#"{"candidate":"a=1"}"#.to_string()).unwrap(),
            1024,
        )
        .unwrap();
        let msg = OutboundMessage::signal(
            SignalKind::IceCandidate,
            RelayedSignal {
                room: RoomId::parse("r1").unwrap(),
                from: ParticipantId::parse("a").unwrap(),
                to: ParticipantId::parse("b").unwrap(),
                payload,
                sender: SenderInfo {
                    display_name: "A".to_string(),
                    avatar_ref: None,
                },
                timestamp: Utc::now(),
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ice-candidate");
        assert_eq!(json["from"], "a");
        assert_eq!(json["payload"]["candidate"], "a=1");
        assert_eq!(json["sender"]["displayName"], "A");
    }

    #[test]
    fn test_error_frame_carries_code() {
        let msg = OutboundMessage::error(&AppError::peer_not_found("gone"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "PEER_NOT_FOUND");
        assert_eq!(json["message"], "gone");
    }

    #[test]
    fn test_membership_action_is_lowercase() {
        let json = serde_json::to_value(MembershipAction::Disconnect).unwrap();
        assert_eq!(json, "disconnect");
    }
}
