//! WebSocket authentication — validates the JWT passed as a query parameter.

use std::sync::Arc;

use tracing::debug;

use signalhub_auth::jwt::JwtDecoder;
use signalhub_auth::profile::InMemoryProfileDirectory;
use signalhub_core::error::AppError;
use signalhub_core::types::{ParticipantId, Profile};

/// Participant identity extracted from a verified token.
#[derive(Debug, Clone)]
pub struct AuthenticatedParticipant {
    /// Verified participant ID (token subject).
    pub participant_id: ParticipantId,
    /// Profile fields carried by the token.
    pub profile: Profile,
}

/// Authenticates WebSocket connections using JWT tokens.
#[derive(Clone)]
pub struct WsAuthenticator {
    /// JWT decoder.
    decoder: Arc<JwtDecoder>,
    /// Directory seeded with profile claims.
    profiles: Arc<InMemoryProfileDirectory>,
}

impl std::fmt::Debug for WsAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsAuthenticator").finish()
    }
}

impl WsAuthenticator {
    /// Creates a new WebSocket authenticator.
    pub fn new(decoder: Arc<JwtDecoder>, profiles: Arc<InMemoryProfileDirectory>) -> Self {
        Self { decoder, profiles }
    }

    /// Authenticates a connection and records its profile claims.
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedParticipant, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::unauthenticated("Missing token"));
        }

        let claims = self.decoder.decode(token)?;
        let participant_id = claims.participant_id()?;
        let profile = claims.profile();
        self.profiles.remember(&participant_id, profile.clone());

        debug!(participant_id = %participant_id, "Authenticated WebSocket participant");
        Ok(AuthenticatedParticipant {
            participant_id,
            profile,
        })
    }
}
