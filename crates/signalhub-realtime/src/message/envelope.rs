//! Wire envelope for inbound frames.
//!
//! Frames are decoded into a flat envelope first so the negotiation payload
//! can be captured as raw JSON, then converted into a typed
//! [`InboundMessage`] with every identifier validated.

use serde::Deserialize;
use serde_json::value::RawValue;

use signalhub_core::error::AppError;
use signalhub_core::types::{Capabilities, ParticipantId, Profile, RoomId};

use super::payload::SignalPayload;
use super::types::{InboundMessage, SignalKind};

/// Inbound event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InboundKind {
    /// `join-room`
    JoinRoom,
    /// `leave-room`
    LeaveRoom,
    /// `offer`
    Offer,
    /// `answer`
    Answer,
    /// `ice-candidate`
    IceCandidate,
    /// `presence-ready`
    PresenceReady,
    /// `liveness-ping`
    LivenessPing,
}

/// A decoded but unvalidated inbound frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    /// Event name.
    #[serde(rename = "type")]
    pub kind: InboundKind,
    /// Room identifier.
    #[serde(default)]
    pub room: Option<String>,
    /// Claimed participant identity.
    #[serde(default)]
    pub participant_id: Option<String>,
    /// Addressed peer for signals.
    #[serde(default)]
    pub to: Option<String>,
    /// Display fields for `join-room`.
    #[serde(default)]
    pub profile: Option<Profile>,
    /// Capabilities for `presence-ready`.
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    /// Opaque negotiation payload for signals.
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl InboundEnvelope {
    /// Decode a text frame.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::validation(format!("Malformed message: {e}")))
    }

    /// Validate the fields required by the event and build the typed message.
    pub fn into_message(self, max_payload_bytes: usize) -> Result<InboundMessage, AppError> {
        match self.kind {
            InboundKind::JoinRoom => Ok(InboundMessage::JoinRoom {
                room: room(self.room)?,
                participant_id: participant(self.participant_id)?,
                profile: self.profile.unwrap_or_default(),
            }),
            InboundKind::LeaveRoom => Ok(InboundMessage::LeaveRoom {
                room: room(self.room)?,
                participant_id: participant(self.participant_id)?,
            }),
            InboundKind::Offer => self.into_signal(SignalKind::Offer, max_payload_bytes),
            InboundKind::Answer => self.into_signal(SignalKind::Answer, max_payload_bytes),
            InboundKind::IceCandidate => {
                self.into_signal(SignalKind::IceCandidate, max_payload_bytes)
            }
            InboundKind::PresenceReady => Ok(InboundMessage::PresenceReady {
                room: room(self.room)?,
                participant_id: participant(self.participant_id)?,
                capabilities: self.capabilities.unwrap_or_default(),
            }),
            InboundKind::LivenessPing => Ok(InboundMessage::LivenessPing),
        }
    }

    fn into_signal(
        self,
        kind: SignalKind,
        max_payload_bytes: usize,
    ) -> Result<InboundMessage, AppError> {
        let room = room(self.room)?;
        let to = ParticipantId::parse(self.to.unwrap_or_default())
            .map_err(|_| AppError::validation("to is required"))?;
        let raw = self
            .payload
            .ok_or_else(|| AppError::validation("payload is required"))?;

        Ok(InboundMessage::Signal {
            kind,
            room,
            to,
            payload: SignalPayload::new(raw, max_payload_bytes)?,
        })
    }
}

fn room(raw: Option<String>) -> Result<RoomId, AppError> {
    RoomId::parse(raw.unwrap_or_default())
}

fn participant(raw: Option<String>) -> Result<ParticipantId, AppError> {
    ParticipantId::parse(raw.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalhub_core::error::ErrorKind;

    fn decode(raw: &str) -> Result<InboundMessage, AppError> {
        InboundEnvelope::parse(raw)?.into_message(1024)
    }

    #[test]
    fn test_join_room_with_profile() {
        let msg = decode(
            r#"{"type":"join-room","room":"r1","participantId":"alice","profile":{"displayName":"Alice"}}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::JoinRoom {
                room,
                participant_id,
                profile,
            } => {
                assert_eq!(room.as_str(), "r1");
                assert_eq!(participant_id.as_str(), "alice");
                assert_eq!(profile.display_name.as_deref(), Some("Alice"));
                assert!(profile.avatar_ref.is_none());
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_missing_room_is_validation_error() {
        let err = decode(r#"{"type":"join-room","participantId":"alice"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "room is required");
    }

    #[test]
    fn test_blank_participant_is_validation_error() {
        let err = decode(r#"{"type":"leave-room","room":"r1","participantId":"  "}"#).unwrap_err();
        assert_eq!(err.message, "participantId is required");
    }

    #[test]
    fn test_signal_keeps_raw_payload() {
        let msg = decode(
            r#"{"type":"offer","room":"r1","to":"bob","payload":{"type":"offer","sdp":"v=0"}}"#,
        )
        .unwrap();
        match msg {
            InboundMessage::Signal {
                kind, to, payload, ..
            } => {
                assert_eq!(kind, SignalKind::Offer);
                assert_eq!(to.as_str(), "bob");
                assert_eq!(payload.as_str(), r#"{"type":"offer","sdp":"v=0"}"#);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_signal_without_target_is_rejected() {
        let err = decode(r#"{"type":"answer","room":"r1","payload":{}}"#).unwrap_err();
        assert_eq!(err.message, "to is required");
    }

    #[test]
    fn test_signal_without_payload_is_rejected() {
        let err = decode(r#"{"type":"ice-candidate","room":"r1","to":"bob"}"#).unwrap_err();
        assert_eq!(err.message, "payload is required");
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err = decode(r#"{"type":"subscribe","channel":"x"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.starts_with("Malformed message"));
    }

    #[test]
    fn test_liveness_ping_needs_no_fields() {
        assert!(matches!(
            decode(r#"{"type":"liveness-ping"}"#).unwrap(),
            InboundMessage::LivenessPing
        ));
    }
}
