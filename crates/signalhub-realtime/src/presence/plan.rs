//! Notification plans.
//!
//! A plan is the ordered list of stages emitted for one membership change.
//! Recipients of every stage are fixed when the plan is built from the
//! post-change snapshot; the room worker only delivers.

use chrono::Utc;

use signalhub_core::types::{ConnectionId, MembershipSnapshot, Participant, ParticipantId};

use crate::message::types::{MembershipAction, OutboundMessage};

/// How a participant left a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureKind {
    /// Explicit `leave-room` or an implicit leave on moving rooms.
    Left,
    /// Connection loss or staleness reclamation.
    Disconnected,
}

impl DepartureKind {
    /// The `membership-updated` action for this departure.
    pub fn action(self) -> MembershipAction {
        match self {
            Self::Left => MembershipAction::Leave,
            Self::Disconnected => MembershipAction::Disconnect,
        }
    }
}

/// One broadcast step.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Connections that receive this stage.
    pub recipients: Vec<ConnectionId>,
    /// The message sent to every recipient.
    pub message: OutboundMessage,
    /// Whether the configured stage delay applies before this stage.
    pub paced: bool,
}

/// Ordered stages for one membership change.
#[derive(Debug, Clone, Default)]
pub struct NotificationPlan {
    /// Stages in emission order.
    pub stages: Vec<Stage>,
}

impl NotificationPlan {
    /// Stages for a fresh admission: confirmation and existing members to the
    /// joiner, `member-joined` to everyone else, then the full snapshot to all.
    pub fn join(snapshot: &MembershipSnapshot, joiner: &Participant) -> Self {
        let room = snapshot.room_id.clone();
        let others = online_connections(snapshot, Some(&joiner.participant_id));
        let everyone = with_joiner(others.clone(), joiner.connection_id);

        Self::default()
            .push(
                vec![joiner.connection_id],
                OutboundMessage::JoinConfirmation {
                    room: room.clone(),
                    user: joiner.view(),
                },
                false,
            )
            .push(
                vec![joiner.connection_id],
                OutboundMessage::ExistingMembers {
                    room: room.clone(),
                    users: snapshot.views_excluding(&joiner.participant_id),
                },
                true,
            )
            .push(
                others,
                OutboundMessage::MemberJoined {
                    room: room.clone(),
                    user: joiner.view(),
                },
                true,
            )
            .push(
                everyone,
                OutboundMessage::MembershipUpdated {
                    room,
                    action: MembershipAction::Join,
                    users: snapshot.views(),
                    timestamp: Utc::now(),
                },
                true,
            )
    }

    /// Stages for a rejoin of the same room. The rejoining connection gets
    /// its confirmation and snapshot again; peers hear about it only when the
    /// participant was offline.
    pub fn rejoin(snapshot: &MembershipSnapshot, participant: &Participant, was_online: bool) -> Self {
        let room = snapshot.room_id.clone();
        let plan = Self::default()
            .push(
                vec![participant.connection_id],
                OutboundMessage::JoinConfirmation {
                    room: room.clone(),
                    user: participant.view(),
                },
                false,
            )
            .push(
                vec![participant.connection_id],
                OutboundMessage::ExistingMembers {
                    room: room.clone(),
                    users: snapshot.views_excluding(&participant.participant_id),
                },
                true,
            );

        if was_online {
            return plan;
        }

        let everyone = with_joiner(
            online_connections(snapshot, Some(&participant.participant_id)),
            participant.connection_id,
        );
        plan.push(
            everyone,
            OutboundMessage::MembershipUpdated {
                room,
                action: MembershipAction::Join,
                users: snapshot.views(),
                timestamp: Utc::now(),
            },
            true,
        )
    }

    /// Stages for a removal, sent to the remaining members without pacing.
    pub fn departure(
        remaining: &MembershipSnapshot,
        departed: &Participant,
        kind: DepartureKind,
    ) -> Self {
        let room = remaining.room_id.clone();
        let recipients = online_connections(remaining, Some(&departed.participant_id));
        let timestamp = Utc::now();
        let mut user = departed.view();
        user.online = false;

        let notice = match kind {
            DepartureKind::Left => OutboundMessage::MemberLeft {
                room: room.clone(),
                user,
                timestamp,
            },
            DepartureKind::Disconnected => OutboundMessage::MemberDisconnected {
                room: room.clone(),
                user,
                timestamp,
            },
        };

        Self::default().push(recipients.clone(), notice, false).push(
            recipients,
            OutboundMessage::MembershipUpdated {
                room,
                action: kind.action(),
                users: remaining.views_excluding(&departed.participant_id),
                timestamp,
            },
            false,
        )
    }

    /// Stage for a participant entering the disconnected grace window.
    pub fn offline(snapshot: &MembershipSnapshot, participant: &ParticipantId) -> Self {
        Self::default().push(
            online_connections(snapshot, Some(participant)),
            OutboundMessage::MembershipUpdated {
                room: snapshot.room_id.clone(),
                action: MembershipAction::Disconnect,
                users: snapshot.views(),
                timestamp: Utc::now(),
            },
            false,
        )
    }

    /// Stage for a capabilities announcement, sent to the other members.
    pub fn ready(snapshot: &MembershipSnapshot, participant: &Participant) -> Self {
        Self::default().push(
            online_connections(snapshot, Some(&participant.participant_id)),
            OutboundMessage::MemberReady {
                room: snapshot.room_id.clone(),
                participant_id: participant.participant_id.clone(),
                capabilities: participant.capabilities.clone(),
            },
            false,
        )
    }

    /// Whether the plan has nothing to deliver.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn push(mut self, recipients: Vec<ConnectionId>, message: OutboundMessage, paced: bool) -> Self {
        if !recipients.is_empty() {
            self.stages.push(Stage {
                recipients,
                message,
                paced,
            });
        }
        self
    }
}

/// Connections of online members, optionally excluding one participant.
fn online_connections(
    snapshot: &MembershipSnapshot,
    excluded: Option<&ParticipantId>,
) -> Vec<ConnectionId> {
    snapshot
        .members
        .iter()
        .filter(|p| p.online && Some(&p.participant_id) != excluded)
        .map(|p| p.connection_id)
        .collect()
}

fn with_joiner(mut others: Vec<ConnectionId>, joiner: ConnectionId) -> Vec<ConnectionId> {
    others.push(joiner);
    others
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalhub_core::types::RoomId;

    fn member(name: &str) -> Participant {
        Participant::new(
            ParticipantId::parse(name).unwrap(),
            ConnectionId::new(),
            name.to_uppercase(),
            None,
        )
    }

    fn kinds(plan: &NotificationPlan) -> Vec<String> {
        plan.stages
            .iter()
            .map(|s| serde_json::to_value(&s.message).unwrap()["type"].to_string())
            .collect()
    }

    #[test]
    fn test_join_plan_orders_stages() {
        let a = member("a");
        let b = member("b");
        let snapshot = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![a.clone(), b.clone()]);

        let plan = NotificationPlan::join(&snapshot, &b);
        assert_eq!(
            kinds(&plan),
            vec![
                "\"join-confirmation\"",
                "\"existing-members\"",
                "\"member-joined\"",
                "\"membership-updated\""
            ]
        );
        assert_eq!(plan.stages[0].recipients, vec![b.connection_id]);
        assert_eq!(plan.stages[2].recipients, vec![a.connection_id]);
        assert_eq!(plan.stages[3].recipients.len(), 2);
    }

    #[test]
    fn test_first_joiner_skips_member_joined() {
        let a = member("a");
        let snapshot = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![a.clone()]);

        let plan = NotificationPlan::join(&snapshot, &a);
        assert_eq!(
            kinds(&plan),
            vec![
                "\"join-confirmation\"",
                "\"existing-members\"",
                "\"membership-updated\""
            ]
        );
    }

    #[test]
    fn test_online_rejoin_stays_private() {
        let a = member("a");
        let b = member("b");
        let snapshot = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![a, b.clone()]);

        let plan = NotificationPlan::rejoin(&snapshot, &b, true);
        assert_eq!(plan.stages.len(), 2);
        assert!(plan.stages.iter().all(|s| s.recipients == vec![b.connection_id]));
    }

    #[test]
    fn test_offline_rejoin_announces_snapshot() {
        let a = member("a");
        let b = member("b");
        let snapshot = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![a, b.clone()]);

        let plan = NotificationPlan::rejoin(&snapshot, &b, false);
        assert_eq!(plan.stages.len(), 3);
        assert_eq!(plan.stages[2].recipients.len(), 2);
    }

    #[test]
    fn test_departure_skips_offline_members() {
        let a = member("a");
        let mut b = member("b");
        b.online = false;
        let gone = member("c");
        let remaining = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![a.clone(), b]);

        let plan = NotificationPlan::departure(&remaining, &gone, DepartureKind::Disconnected);
        assert_eq!(
            kinds(&plan),
            vec!["\"member-disconnected\"", "\"membership-updated\""]
        );
        assert!(plan.stages.iter().all(|s| !s.paced));
        assert_eq!(plan.stages[0].recipients, vec![a.connection_id]);
    }

    #[test]
    fn test_departure_from_emptied_room_is_empty() {
        let gone = member("a");
        let remaining = MembershipSnapshot::new(RoomId::parse("r1").unwrap(), vec![]);
        assert!(NotificationPlan::departure(&remaining, &gone, DepartureKind::Left).is_empty());
    }
}
