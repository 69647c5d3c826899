//! Durable membership store using PostgreSQL.
//!
//! One row per resident participant, keyed by `participant_id`, so the
//! single-residency invariant is enforced by the primary key. Upserts run
//! inside a transaction holding a per-participant advisory lock so the
//! previous row read and the replacing write are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tracing::debug;

use signalhub_core::error::{AppError, ErrorKind};
use signalhub_core::result::AppResult;
use signalhub_core::traits::{
    Admission, AdmissionKind, Departure, MembershipStore, RemovalCondition, StoreMode,
};
use signalhub_core::types::{Capabilities, ConnectionId, Participant, ParticipantId, RoomId};

use super::client::DurableClient;

/// Database row for `room_members`.
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    participant_id: ParticipantId,
    room_id: RoomId,
    display_name: String,
    avatar_ref: Option<String>,
    capabilities: Json<Capabilities>,
    connection_id: ConnectionId,
    online: bool,
    last_active_at: DateTime<Utc>,
    joined_at: DateTime<Utc>,
}

impl From<MemberRow> for Participant {
    fn from(row: MemberRow) -> Self {
        Self {
            participant_id: row.participant_id,
            display_name: row.display_name,
            avatar_ref: row.avatar_ref,
            capabilities: row.capabilities.0,
            connection_id: row.connection_id,
            online: row.online,
            last_active_at: row.last_active_at,
            joined_at: row.joined_at,
        }
    }
}

const LIST_ROOM: &str =
    "SELECT * FROM room_members WHERE room_id = $1 ORDER BY joined_at ASC, participant_id ASC";

fn store_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::StoreUnavailable, context, e)
}

/// PostgreSQL membership store.
#[derive(Debug, Clone)]
pub struct DurableMembershipStore {
    client: DurableClient,
}

impl DurableMembershipStore {
    /// Create a store over an established pool.
    pub fn new(client: DurableClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MembershipStore for DurableMembershipStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Durable
    }

    async fn upsert(&self, room_id: &RoomId, participant: Participant) -> AppResult<Admission> {
        let mut tx = self
            .client
            .pool()
            .begin()
            .await
            .map_err(store_err("Failed to begin membership transaction"))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&participant.participant_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err("Failed to lock participant"))?;

        let previous = sqlx::query_as::<_, MemberRow>(
            "SELECT * FROM room_members WHERE participant_id = $1",
        )
        .bind(&participant.participant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err("Failed to read previous membership"))?
        .map(|row| (row.room_id.clone(), Participant::from(row)));

        let mut incoming = participant;
        if let Some((prev_room, prev)) = &previous {
            if prev_room == room_id {
                incoming.joined_at = prev.joined_at;
                incoming.capabilities = prev.capabilities.clone();
            }
        }

        let stored: Participant = sqlx::query_as::<_, MemberRow>(
            "INSERT INTO room_members \
             (participant_id, room_id, display_name, avatar_ref, capabilities, \
              connection_id, online, last_active_at, joined_at) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8) \
             ON CONFLICT (participant_id) DO UPDATE SET \
              room_id = EXCLUDED.room_id, \
              display_name = EXCLUDED.display_name, \
              avatar_ref = EXCLUDED.avatar_ref, \
              capabilities = EXCLUDED.capabilities, \
              connection_id = EXCLUDED.connection_id, \
              online = TRUE, \
              last_active_at = EXCLUDED.last_active_at, \
              joined_at = EXCLUDED.joined_at \
             RETURNING *",
        )
        .bind(&incoming.participant_id)
        .bind(room_id)
        .bind(&incoming.display_name)
        .bind(&incoming.avatar_ref)
        .bind(Json(&incoming.capabilities))
        .bind(incoming.connection_id)
        .bind(incoming.last_active_at)
        .bind(incoming.joined_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err("Failed to write membership"))?
        .into();

        let members = sqlx::query_as::<_, MemberRow>(LIST_ROOM)
            .bind(room_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(store_err("Failed to list room members"))?
            .into_iter()
            .map(Participant::from)
            .collect();

        tx.commit()
            .await
            .map_err(store_err("Failed to commit membership transaction"))?;

        let kind = match previous {
            Some((prev_room, prev)) if prev_room == *room_id => AdmissionKind::Rejoined {
                was_online: prev.online,
            },
            Some((from, departed)) => {
                debug!(
                    participant = %stored.participant_id,
                    from = %from,
                    to = %room_id,
                    "Moved participant between rooms"
                );
                AdmissionKind::Moved { from, departed }
            }
            None => AdmissionKind::Fresh,
        };
        Ok(Admission {
            participant: stored,
            kind,
            members,
        })
    }

    async fn get(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> AppResult<Option<Participant>> {
        sqlx::query_as::<_, MemberRow>(
            "SELECT * FROM room_members WHERE room_id = $1 AND participant_id = $2",
        )
        .bind(room_id)
        .bind(participant_id)
        .fetch_optional(self.client.pool())
        .await
        .map(|row| row.map(Participant::from))
        .map_err(store_err("Failed to find member"))
    }

    async fn list(&self, room_id: &RoomId) -> AppResult<Vec<Participant>> {
        sqlx::query_as::<_, MemberRow>(LIST_ROOM)
            .bind(room_id)
            .fetch_all(self.client.pool())
            .await
            .map(|rows| rows.into_iter().map(Participant::from).collect())
            .map_err(store_err("Failed to list room members"))
    }

    async fn remove(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        condition: RemovalCondition,
    ) -> AppResult<Option<Departure>> {
        let (connection, idle_before) = match condition {
            RemovalCondition::Always => (None, None),
            RemovalCondition::Connection(connection_id) => (Some(connection_id), None),
            RemovalCondition::IdleBefore(cutoff) => (None, Some(cutoff)),
        };

        let mut tx = self
            .client
            .pool()
            .begin()
            .await
            .map_err(store_err("Failed to begin membership transaction"))?;

        let departed = sqlx::query_as::<_, MemberRow>(
            "DELETE FROM room_members \
             WHERE room_id = $1 AND participant_id = $2 \
               AND ($3::uuid IS NULL OR connection_id = $3) \
               AND ($4::timestamptz IS NULL OR last_active_at < $4) \
             RETURNING *",
        )
        .bind(room_id)
        .bind(participant_id)
        .bind(connection)
        .bind(idle_before)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err("Failed to remove member"))?;

        let Some(departed) = departed else {
            return Ok(None);
        };

        let remaining = sqlx::query_as::<_, MemberRow>(LIST_ROOM)
            .bind(room_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(store_err("Failed to list room members"))?
            .into_iter()
            .map(Participant::from)
            .collect();

        tx.commit()
            .await
            .map_err(store_err("Failed to commit membership transaction"))?;

        Ok(Some(Departure {
            departed: departed.into(),
            remaining,
        }))
    }

    async fn find_by_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>> {
        sqlx::query_as::<_, (RoomId, ParticipantId)>(
            "SELECT room_id, participant_id FROM room_members WHERE connection_id = $1",
        )
        .bind(connection_id)
        .fetch_optional(self.client.pool())
        .await
        .map_err(store_err("Failed to resolve connection"))
    }

    async fn is_empty(&self, room_id: &RoomId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT NOT EXISTS (SELECT 1 FROM room_members WHERE room_id = $1)",
        )
        .bind(room_id)
        .fetch_one(self.client.pool())
        .await
        .map_err(store_err("Failed to check room occupancy"))
    }

    async fn set_capabilities(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        capabilities: Capabilities,
    ) -> AppResult<Option<Participant>> {
        sqlx::query_as::<_, MemberRow>(
            "UPDATE room_members SET capabilities = $3 \
             WHERE room_id = $1 AND participant_id = $2 RETURNING *",
        )
        .bind(room_id)
        .bind(participant_id)
        .bind(Json(capabilities))
        .fetch_optional(self.client.pool())
        .await
        .map(|row| row.map(Participant::from))
        .map_err(store_err("Failed to update capabilities"))
    }

    async fn touch(&self, connection_id: &ConnectionId) -> AppResult<bool> {
        sqlx::query("UPDATE room_members SET last_active_at = NOW() WHERE connection_id = $1")
            .bind(connection_id)
            .execute(self.client.pool())
            .await
            .map(|result| result.rows_affected() > 0)
            .map_err(store_err("Failed to refresh activity"))
    }

    async fn mark_offline(
        &self,
        connection_id: &ConnectionId,
    ) -> AppResult<Option<(RoomId, ParticipantId)>> {
        sqlx::query_as::<_, (RoomId, ParticipantId)>(
            "UPDATE room_members SET online = FALSE, last_active_at = NOW() \
             WHERE connection_id = $1 \
             RETURNING room_id, participant_id",
        )
        .bind(connection_id)
        .fetch_optional(self.client.pool())
        .await
        .map_err(store_err("Failed to mark member offline"))
    }

    async fn stale_since(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<(RoomId, ParticipantId)>> {
        sqlx::query_as::<_, (RoomId, ParticipantId)>(
            "SELECT room_id, participant_id FROM room_members WHERE last_active_at < $1",
        )
        .bind(cutoff)
        .fetch_all(self.client.pool())
        .await
        .map_err(store_err("Failed to find stale members"))
    }

    async fn clear(&self) -> AppResult<u64> {
        sqlx::query("DELETE FROM room_members")
            .execute(self.client.pool())
            .await
            .map(|result| result.rows_affected())
            .map_err(store_err("Failed to purge membership"))
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.client.pool())
            .await
            .map(|v| v == 1)
            .map_err(store_err("Membership store health check failed"))
    }
}
