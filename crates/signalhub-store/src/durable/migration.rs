//! Schema migration runner for the durable store.

use sqlx::PgPool;
use tracing::info;

use signalhub_core::error::{AppError, ErrorKind};

/// Run all pending membership schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!("Running membership store migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::StoreUnavailable,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Membership store migrations completed successfully");
    Ok(())
}
