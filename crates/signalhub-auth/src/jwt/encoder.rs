//! JWT token creation.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use signalhub_core::config::AuthConfig;
use signalhub_core::error::AppError;

use super::claims::Claims;

/// Creates signed connection tokens.
///
/// Issuing tokens belongs to the identity provider; the server keeps an
/// encoder for tooling and tests that need tokens the decoder accepts.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder").finish_non_exhaustive()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Issue a token for `participant_id` valid for `ttl`.
    pub fn issue(
        &self,
        participant_id: &str,
        display_name: Option<&str>,
        avatar_ref: Option<&str>,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: participant_id.to_string(),
            name: display_name.map(str::to_string),
            avatar: avatar_ref.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
    }
}
