//! Persistence for the relay engine: message log, module configs,
//! sanctions and the welcome ledger.
//! Traits in [`store`], SQLite implementations in [`sqlite`], in-memory
//! implementations for tests in [`memory`].

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use {
    error::{Error, Result},
    memory::{MemoryModuleConfigs, MemoryRelayLog, MemorySanctions, MemoryWelcomeLedger},
    sqlite::{SqliteModuleConfigs, SqliteRelayLog, SqliteSanctions, SqliteWelcomeLedger},
    store::{ModuleConfigStore, RelayLogStore, SanctionStore, WelcomeLedger},
    types::{EntityKind, RelayDelivery, RelayRecord, RelayStatus, SanctionKind, StoredModuleConfig},
};

/// Run database migrations for the store crate.
///
/// Creates every relay table. Call once at application startup when using
/// the [`sqlite`] stores.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
