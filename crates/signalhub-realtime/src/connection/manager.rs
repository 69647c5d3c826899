//! Connection manager — handles connection lifecycle and inbound message routing.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use signalhub_core::config::RealtimeConfig;
use signalhub_core::error::AppError;
use signalhub_core::result::AppResult;
use signalhub_core::types::{ConnectionId, ParticipantId};

use crate::message::serializer::{deserialize_inbound, serialize_outbound};
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::metrics::{RealtimeMetrics, connections, messages};
use crate::relay::SignalingRelay;
use crate::room::{DisconnectPolicy, RoomManager};

use super::handle::ConnectionHandle;
use super::pool::ConnectionPool;

/// Manages all attached WebSocket connections.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Connection pool.
    pool: Arc<ConnectionPool>,
    /// Room operations.
    rooms: Arc<RoomManager>,
    /// Signal forwarding.
    relay: Arc<SignalingRelay>,
    /// Metrics.
    metrics: Arc<RealtimeMetrics>,
    /// What a dropped transport does to room membership.
    policy: DisconnectPolicy,
    /// Configuration.
    config: RealtimeConfig,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new(
        config: RealtimeConfig,
        pool: Arc<ConnectionPool>,
        rooms: Arc<RoomManager>,
        relay: Arc<SignalingRelay>,
        metrics: Arc<RealtimeMetrics>,
        policy: DisconnectPolicy,
    ) -> Self {
        Self {
            pool,
            rooms,
            relay,
            metrics,
            policy,
            config,
        }
    }

    /// Registers a new authenticated connection.
    ///
    /// Returns the connection handle and a receiver for outbound frames.
    pub fn register(
        &self,
        participant_id: ParticipantId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let handle = Arc::new(ConnectionHandle::new(participant_id, tx));

        self.pool.add(handle.clone());
        connections::record_connect(&self.metrics);

        info!(
            conn_id = %handle.id,
            participant_id = %handle.participant_id,
            "WebSocket connection registered"
        );

        (handle, rx)
    }

    /// Unregisters a connection and applies the disconnect policy to its
    /// room membership.
    pub async fn unregister(&self, conn_id: &ConnectionId) {
        let Some(handle) = self.pool.remove(conn_id) else {
            return;
        };
        handle.mark_closed();
        connections::record_disconnect(&self.metrics);

        if let Err(e) = self.rooms.disconnect(conn_id, self.policy).await {
            warn!(
                conn_id = %conn_id,
                participant_id = %handle.participant_id,
                code = %e.kind,
                error = %e.message,
                "Failed to process disconnect"
            );
        }

        info!(
            conn_id = %conn_id,
            participant_id = %handle.participant_id,
            connected_secs = (Utc::now() - handle.connected_at).num_seconds(),
            "WebSocket connection unregistered"
        );
    }

    /// Processes an inbound text frame from a client.
    ///
    /// Failures are reported to this connection as an `error` frame and
    /// never close it.
    pub async fn handle_inbound(&self, conn_id: &ConnectionId, raw_message: &str) {
        let Some(handle) = self.pool.get(conn_id) else {
            warn!(conn_id = %conn_id, "Message from unknown connection");
            return;
        };

        messages::record_received(&self.metrics);

        if let Err(err) = self.dispatch(&handle, raw_message).await {
            warn!(
                conn_id = %conn_id,
                participant_id = %handle.participant_id,
                code = %err.kind,
                error = %err.message,
                "Inbound message rejected"
            );
            self.reply(&handle, &OutboundMessage::error(&err));
        }
    }

    async fn dispatch(&self, handle: &ConnectionHandle, raw_message: &str) -> AppResult<()> {
        let message = deserialize_inbound(
            raw_message,
            self.config.max_message_bytes,
            self.config.max_payload_bytes,
        )?;

        match message {
            InboundMessage::JoinRoom {
                room,
                participant_id,
                profile,
            } => {
                ensure_identity(handle, &participant_id)?;
                self.rooms
                    .join(participant_id, room, handle.id, profile)
                    .await?;
            }
            InboundMessage::LeaveRoom {
                room,
                participant_id,
            } => {
                ensure_identity(handle, &participant_id)?;
                self.rooms.leave(&participant_id, &room).await?;
            }
            InboundMessage::Signal {
                kind,
                room,
                to,
                payload,
            } => {
                self.relay
                    .relay(kind, &room, &handle.id, &to, payload)
                    .await?;
            }
            InboundMessage::PresenceReady {
                room,
                participant_id,
                capabilities,
            } => {
                ensure_identity(handle, &participant_id)?;
                self.rooms
                    .mark_ready(&handle.id, &room, &participant_id, capabilities)
                    .await?;
            }
            InboundMessage::LivenessPing => {
                self.rooms.touch(&handle.id).await?;
                self.reply(
                    handle,
                    &OutboundMessage::LivenessPong {
                        timestamp: Utc::now().timestamp_millis(),
                    },
                );
            }
        }
        Ok(())
    }

    fn reply(&self, handle: &ConnectionHandle, message: &OutboundMessage) {
        match serialize_outbound(message) {
            Ok(frame) => match handle.send(frame) {
                Ok(()) => messages::record_sent(&self.metrics, 1),
                Err(_) => messages::record_dropped(&self.metrics, 1),
            },
            Err(e) => warn!(conn_id = %handle.id, error = %e, "Failed to serialize reply"),
        }
    }

    /// Closes all connections.
    pub fn close_all(&self) {
        let all = self.pool.all_connections();
        for conn in &all {
            conn.mark_closed();
            if self.pool.remove(&conn.id).is_some() {
                connections::record_disconnect(&self.metrics);
            }
        }
        info!(count = all.len(), "All connections closed");
    }

    /// Returns the total connection count.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// The policy applied when a transport drops.
    pub fn disconnect_policy(&self) -> DisconnectPolicy {
        self.policy
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

fn ensure_identity(handle: &ConnectionHandle, claimed: &ParticipantId) -> AppResult<()> {
    if handle.participant_id != *claimed {
        return Err(AppError::validation(format!(
            "participantId '{claimed}' does not match the authenticated participant"
        )));
    }
    Ok(())
}
