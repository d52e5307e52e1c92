//! Process wiring: config -> store -> engine

use std::sync::Arc;

use anyhow::Context;

use crate::account::{AccountStore, Database, MemoryAccountStore, PgAccountStore};
use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::transfer::TransferEngine;

/// Open the configured account store
///
/// The memory store starts seeded. The Postgres store only makes sure the
/// table exists; balances are seeded by `POST /reset`.
pub async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn AccountStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory account store");
            Ok(Arc::new(MemoryAccountStore::seeded()))
        }
        StoreBackend::Postgres => {
            let db = Database::connect(
                &config.postgres_url,
                config.max_connections,
                config.acquire_timeout(),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            let store = PgAccountStore::new(db);
            store
                .ensure_schema()
                .await
                .context("Failed to create accounts table")?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the transfer engine from the full application config
pub async fn build_engine(config: &AppConfig) -> anyhow::Result<TransferEngine> {
    let store = build_store(&config.store).await?;
    Ok(TransferEngine::with_hold_delay(
        store,
        config.transfer.hold_delay(),
    ))
}
