//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so an empty
//! configuration is valid.

pub mod app;
pub mod auth;
pub mod logging;
pub mod realtime;
pub mod store;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::AuthConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::{LivenessConfig, PresenceConfig, RealtimeConfig};
pub use self::store::{DatabaseConfig, StoreBackend, StoreConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Membership store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// WebSocket engine settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Presence broadcast pacing.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Stale participant reclamation.
    #[serde(default)]
    pub liveness: LivenessConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `<dir>/default` with an environment-specific overlay
    /// `<dir>/<env>` and environment variables prefixed with `SIGNALHUB_`
    /// (nested keys separated by `__`, e.g. `SIGNALHUB_STORE__BACKEND`).
    pub fn load(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SIGNALHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
