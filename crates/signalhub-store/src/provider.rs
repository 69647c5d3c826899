//! Store manager that builds the configured membership backend.

use std::sync::Arc;

use tracing::info;

use signalhub_core::config::{StoreBackend, StoreConfig};
use signalhub_core::error::AppError;
use signalhub_core::result::AppResult;
use signalhub_core::traits::{MembershipStore, StoreMode};

/// Owns the configured membership store.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct StoreManager {
    /// The inner store.
    inner: Arc<dyn MembershipStore>,
}

impl StoreManager {
    /// Create a store manager from configuration.
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: Arc<dyn MembershipStore> = match config.backend {
            #[cfg(feature = "volatile")]
            StoreBackend::Volatile => {
                info!("Initializing volatile membership store");
                Arc::new(crate::volatile::VolatileMembershipStore::new())
            }
            #[cfg(feature = "durable")]
            StoreBackend::Durable => {
                info!("Initializing durable membership store");
                let client = crate::durable::DurableClient::connect(&config.database).await?;
                crate::durable::run_migrations(client.pool()).await?;
                Arc::new(crate::durable::DurableMembershipStore::new(client))
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(AppError::configuration(format!(
                    "Store backend '{other:?}' is not compiled into this build"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a store manager from an existing store (for testing).
    pub fn from_store(store: Arc<dyn MembershipStore>) -> Self {
        Self { inner: store }
    }

    /// Shared handle to the inner store.
    pub fn store(&self) -> Arc<dyn MembershipStore> {
        Arc::clone(&self.inner)
    }

    /// Which family the inner store belongs to.
    pub fn mode(&self) -> StoreMode {
        self.inner.mode()
    }

    /// Remove every membership record if the backend survives restarts.
    ///
    /// Returns the number of records removed. A volatile store always
    /// starts empty and is left untouched.
    pub async fn purge_on_startup(&self) -> AppResult<u64> {
        if self.inner.mode() != StoreMode::Durable {
            return Ok(0);
        }
        let removed = self.inner.clear().await?;
        info!(removed, "Purged membership records left over from previous run");
        Ok(removed)
    }
}
