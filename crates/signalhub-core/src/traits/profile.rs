//! Profile lookup consumed when a joiner omits display fields.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ParticipantId, Profile};

/// Source of default display names and avatars.
#[async_trait]
pub trait ProfileDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Look up the stored profile for a participant.
    async fn lookup(&self, participant_id: &ParticipantId) -> AppResult<Option<Profile>>;
}
