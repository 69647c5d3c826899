//! In-memory profile directory.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use signalhub_core::result::AppResult;
use signalhub_core::traits::ProfileDirectory;
use signalhub_core::types::{ParticipantId, Profile};

/// Profile directory kept in process memory.
///
/// Entries are seeded from verified token claims at connection time and
/// consulted when a `join-room` omits display fields.
#[derive(Debug, Default)]
pub struct InMemoryProfileDirectory {
    profiles: DashMap<ParticipantId, Profile>,
}

impl InMemoryProfileDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the profile for a participant, merging over any known values.
    pub fn remember(&self, participant_id: &ParticipantId, profile: Profile) {
        let mut entry = self.profiles.entry(participant_id.clone()).or_default();
        let merged = profile.or(entry.value().clone());
        if *entry.value() != merged {
            debug!(participant_id = %participant_id, "Updated directory profile");
            *entry.value_mut() = merged;
        }
    }

    /// Number of known profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profiles are known.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryProfileDirectory {
    async fn lookup(&self, participant_id: &ParticipantId) -> AppResult<Option<Profile>> {
        Ok(self
            .profiles
            .get(participant_id)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_unknown_is_none() {
        let directory = InMemoryProfileDirectory::new();
        let pid = ParticipantId::parse("ghost").unwrap();
        assert!(directory.lookup(&pid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remember_merges_over_known_values() {
        let directory = InMemoryProfileDirectory::new();
        let pid = ParticipantId::parse("alice").unwrap();
        directory.remember(
            &pid,
            Profile {
                display_name: Some("Alice".to_string()),
                avatar_ref: Some("alice.png".to_string()),
            },
        );
        directory.remember(
            &pid,
            Profile {
                display_name: Some("Alice L.".to_string()),
                avatar_ref: None,
            },
        );

        let profile = directory.lookup(&pid).await.unwrap().unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Alice L."));
        assert_eq!(profile.avatar_ref.as_deref(), Some("alice.png"));
        assert_eq!(directory.len(), 1);
    }
}
