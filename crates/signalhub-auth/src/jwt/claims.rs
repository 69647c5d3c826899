//! JWT claims carried by connection tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use signalhub_core::error::AppError;
use signalhub_core::types::{ParticipantId, Profile};

/// JWT claims payload embedded in every connection token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the participant ID.
    pub sub: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    /// The participant identity named by the subject claim.
    pub fn participant_id(&self) -> Result<ParticipantId, AppError> {
        ParticipantId::parse(self.sub.as_str())
            .map_err(|_| AppError::unauthenticated("Token subject is not a valid participant ID"))
    }

    /// Profile fields carried by the token.
    pub fn profile(&self) -> Profile {
        Profile {
            display_name: self.name.clone(),
            avatar_ref: self.avatar.clone(),
        }
    }

    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}
