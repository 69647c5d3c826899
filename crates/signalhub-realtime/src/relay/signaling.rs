//! Signaling relay — forwards offers, answers and ICE candidates to one peer.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use signalhub_core::error::AppError;
use signalhub_core::result::AppResult;
use signalhub_core::types::{ConnectionId, ParticipantId, RoomId};

use crate::connection::handle::SendFailure;
use crate::connection::pool::ConnectionPool;
use crate::message::payload::SignalPayload;
use crate::message::serializer::serialize_outbound;
use crate::message::types::{OutboundMessage, RelayedSignal, SenderInfo, SignalKind};
use crate::metrics::{RealtimeMetrics, messages};
use crate::room::RoomManager;

/// Resolves both ends of a signal and forwards the payload untouched.
///
/// Delivery is best effort: a signal reaches the addressed connection's
/// queue or the sender gets an error. Nothing is ever broadcast.
#[derive(Debug)]
pub struct SignalingRelay {
    /// Membership lookups.
    rooms: Arc<RoomManager>,
    /// Delivery target.
    pool: Arc<ConnectionPool>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
}

impl SignalingRelay {
    /// Creates a relay.
    pub fn new(
        rooms: Arc<RoomManager>,
        pool: Arc<ConnectionPool>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            rooms,
            pool,
            metrics,
        }
    }

    /// Forward `payload` from the participant on `from` to `to` in `room_id`.
    pub async fn relay(
        &self,
        kind: SignalKind,
        room_id: &RoomId,
        from: &ConnectionId,
        to: &ParticipantId,
        payload: SignalPayload,
    ) -> AppResult<()> {
        let result = self.forward(kind, room_id, from, to, payload).await;
        match &result {
            Ok(()) => messages::record_relay(&self.metrics),
            Err(_) => messages::record_relay_failure(&self.metrics),
        }
        result
    }

    async fn forward(
        &self,
        kind: SignalKind,
        room_id: &RoomId,
        from: &ConnectionId,
        to: &ParticipantId,
        payload: SignalPayload,
    ) -> AppResult<()> {
        let not_joined =
            || AppError::validation(format!("connection has not joined room '{room_id}'"));

        let sender_id = match self.rooms.resolve_connection(from).await? {
            Some((room, participant_id)) if room == *room_id => participant_id,
            _ => return Err(not_joined()),
        };
        let sender = self
            .rooms
            .member(room_id, &sender_id)
            .await?
            .ok_or_else(not_joined)?;

        let receiver = self
            .rooms
            .member(room_id, to)
            .await?
            .filter(|p| p.online)
            .ok_or_else(|| peer_not_found(to, room_id))?;

        let frame = serialize_outbound(&OutboundMessage::signal(
            kind,
            RelayedSignal {
                room: room_id.clone(),
                from: sender.participant_id.clone(),
                to: receiver.participant_id.clone(),
                payload,
                sender: SenderInfo {
                    display_name: sender.display_name,
                    avatar_ref: sender.avatar_ref,
                },
                timestamp: Utc::now(),
            },
        ))?;

        self.pool
            .deliver(&receiver.connection_id, frame)
            .map_err(|failure| match failure {
                SendFailure::Closed => peer_not_found(to, room_id),
                SendFailure::Full => AppError::peer_not_found(format!(
                    "participant '{to}' in room '{room_id}' is not accepting messages \
                     (outbound buffer full)"
                )),
            })?;
        messages::record_sent(&self.metrics, 1);

        debug!(
            room_id = %room_id,
            from = %sender.participant_id,
            to = %to,
            %kind,
            "Relayed signal"
        );
        Ok(())
    }
}

fn peer_not_found(to: &ParticipantId, room_id: &RoomId) -> AppError {
    AppError::peer_not_found(format!(
        "participant '{to}' is not in room '{room_id}' or is offline"
    ))
}
