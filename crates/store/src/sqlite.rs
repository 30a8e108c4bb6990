//! SQLite-backed stores.

use {
    async_trait::async_trait,
    sqlx::SqlitePool,
};

use guildlink_common::{GuildId, MessageId, RelayId, RelayKind, UserId, unix_now};

use crate::{
    error::{Error, Result},
    store::{ModuleConfigStore, RelayLogStore, SanctionStore, WelcomeLedger},
    types::{EntityKind, RelayDelivery, RelayRecord, RelayStatus, SanctionKind, StoredModuleConfig},
};

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct RelayRecordRow {
    id: String,
    kind: String,
    origin_guild_id: i64,
    origin_channel_id: i64,
    origin_message_id: i64,
    author_id: i64,
    author_name: String,
    content: String,
    privileged: i64,
    status: String,
    created_at: i64,
}

impl TryFrom<RelayRecordRow> for RelayRecord {
    type Error = Error;

    fn try_from(r: RelayRecordRow) -> Result<Self> {
        let id = RelayId::parse(&r.id).map_err(|e| Error::corrupt(format!("id {}: {e}", r.id)))?;
        let kind = r.kind.parse::<RelayKind>().map_err(Error::corrupt)?;
        let status = match r.status.as_str() {
            "active" => RelayStatus::Active,
            "deleted" => RelayStatus::Deleted,
            other => return Err(Error::corrupt(format!("relay status {other}"))),
        };
        Ok(Self {
            id,
            kind,
            origin_guild_id: r.origin_guild_id as u64,
            origin_channel_id: r.origin_channel_id as u64,
            origin_message_id: r.origin_message_id as u64,
            author_id: r.author_id as u64,
            author_name: r.author_name,
            content: r.content,
            privileged: r.privileged != 0,
            status,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    relay_id: String,
    guild_id: i64,
    channel_id: i64,
    message_id: i64,
}

impl TryFrom<DeliveryRow> for RelayDelivery {
    type Error = Error;

    fn try_from(r: DeliveryRow) -> Result<Self> {
        Ok(Self {
            relay_id: RelayId::parse(&r.relay_id)
                .map_err(|e| Error::corrupt(format!("relay id {}: {e}", r.relay_id)))?,
            guild_id: r.guild_id as u64,
            channel_id: r.channel_id as u64,
            message_id: r.message_id as u64,
        })
    }
}

/// SQLite-backed relay message log.
#[derive(Clone)]
pub struct SqliteRelayLog {
    pool: SqlitePool,
}

impl SqliteRelayLog {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the relay log schema.
    ///
    /// Schema is managed by [`crate::run_migrations`] in deployments.
    /// This method is retained for tests that use in-memory databases.
    #[doc(hidden)]
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS relay_messages (
                id                TEXT    PRIMARY KEY,
                kind              TEXT    NOT NULL,
                origin_guild_id   INTEGER NOT NULL,
                origin_channel_id INTEGER NOT NULL,
                origin_message_id INTEGER NOT NULL,
                author_id         INTEGER NOT NULL,
                author_name       TEXT    NOT NULL,
                content           TEXT    NOT NULL,
                privileged        INTEGER NOT NULL DEFAULT 0,
                status            TEXT    NOT NULL DEFAULT 'active',
                created_at        INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relay_messages_origin
                ON relay_messages (origin_message_id)",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS relay_deliveries (
                relay_id   TEXT    NOT NULL,
                guild_id   INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL,
                PRIMARY KEY (relay_id, guild_id)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RelayLogStore for SqliteRelayLog {
    async fn create_relay_record(&self, record: &RelayRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO relay_messages
               (id, kind, origin_guild_id, origin_channel_id, origin_message_id,
                author_id, author_name, content, privileged, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.compact())
        .bind(record.kind.as_str())
        .bind(record.origin_guild_id as i64)
        .bind(record.origin_channel_id as i64)
        .bind(record.origin_message_id as i64)
        .bind(record.author_id as i64)
        .bind(&record.author_name)
        .bind(&record.content)
        .bind(i64::from(record.privileged))
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::conflict(format!("relay id {}", record.id))
            },
            _ => Error::from(e),
        })?;
        Ok(())
    }

    async fn get_relay_record(&self, id: RelayId) -> Result<Option<RelayRecord>> {
        let row =
            sqlx::query_as::<_, RelayRecordRow>("SELECT * FROM relay_messages WHERE id = ?")
                .bind(id.compact())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_relay_record_by_origin(
        &self,
        origin_message_id: MessageId,
    ) -> Result<Option<RelayRecord>> {
        let row = sqlx::query_as::<_, RelayRecordRow>(
            "SELECT * FROM relay_messages WHERE origin_message_id = ?
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(origin_message_id as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn add_delivery(&self, delivery: &RelayDelivery) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO relay_deliveries (relay_id, guild_id, channel_id, message_id)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(relay_id, guild_id) DO UPDATE SET
                 channel_id = excluded.channel_id,
                 message_id = excluded.message_id"#,
        )
        .bind(delivery.relay_id.compact())
        .bind(delivery.guild_id as i64)
        .bind(delivery.channel_id as i64)
        .bind(delivery.message_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deliveries(&self, id: RelayId) -> Result<Vec<RelayDelivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(
            "SELECT * FROM relay_deliveries WHERE relay_id = ? ORDER BY guild_id",
        )
        .bind(id.compact())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_deleted(&self, id: RelayId) -> Result<()> {
        sqlx::query("UPDATE relay_messages SET status = 'deleted' WHERE id = ?")
            .bind(id.compact())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct ModuleConfigRow {
    guild_id: i64,
    module_id: String,
    config: String,
    updated_at: i64,
}

impl TryFrom<ModuleConfigRow> for StoredModuleConfig {
    type Error = Error;

    fn try_from(r: ModuleConfigRow) -> Result<Self> {
        Ok(Self {
            guild_id: r.guild_id as u64,
            module_id: r.module_id,
            config: serde_json::from_str(&r.config)?,
            updated_at: r.updated_at,
        })
    }
}

/// SQLite-backed module config store.
#[derive(Clone)]
pub struct SqliteModuleConfigs {
    pool: SqlitePool,
}

impl SqliteModuleConfigs {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the module config schema.
    ///
    /// Schema is managed by [`crate::run_migrations`] in deployments.
    /// This method is retained for tests that use in-memory databases.
    #[doc(hidden)]
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS module_configs (
                guild_id   INTEGER NOT NULL,
                module_id  TEXT    NOT NULL,
                config     TEXT    NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (guild_id, module_id)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ModuleConfigStore for SqliteModuleConfigs {
    async fn get_module_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        let config: Option<String> = sqlx::query_scalar(
            "SELECT config FROM module_configs WHERE guild_id = ? AND module_id = ?",
        )
        .bind(guild_id as i64)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        config
            .map(|c| serde_json::from_str(&c).map_err(Error::from))
            .transpose()
    }

    async fn save_module_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
        config: &serde_json::Value,
    ) -> Result<()> {
        let config_json = serde_json::to_string(config)?;
        sqlx::query(
            r#"INSERT INTO module_configs (guild_id, module_id, config, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(guild_id, module_id) DO UPDATE SET
                 config = excluded.config,
                 updated_at = excluded.updated_at"#,
        )
        .bind(guild_id as i64)
        .bind(module_id)
        .bind(&config_json)
        .bind(unix_now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_module_config(&self, guild_id: GuildId, module_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM module_configs WHERE guild_id = ? AND module_id = ?")
            .bind(guild_id as i64)
            .bind(module_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all_module_configs(&self, guild_id: GuildId) -> Result<Vec<StoredModuleConfig>> {
        let rows = sqlx::query_as::<_, ModuleConfigRow>(
            "SELECT * FROM module_configs WHERE guild_id = ? ORDER BY module_id",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// SQLite view over the moderation system's sanction table.
#[derive(Clone)]
pub struct SqliteSanctions {
    pool: SqlitePool,
}

impl SqliteSanctions {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the sanctions schema.
    ///
    /// Schema is managed by [`crate::run_migrations`] in deployments.
    /// This method is retained for tests that use in-memory databases.
    #[doc(hidden)]
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sanctions (
                entity_kind TEXT    NOT NULL,
                entity_id   INTEGER NOT NULL,
                kind        TEXT    NOT NULL,
                expires_at  INTEGER,
                PRIMARY KEY (entity_kind, entity_id, kind)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Writer side, used by the moderation surface and by tests.
    /// `expires_at = None` means the sanction never expires.
    pub async fn record_sanction(
        &self,
        entity_kind: EntityKind,
        entity_id: u64,
        kind: SanctionKind,
        expires_at: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO sanctions (entity_kind, entity_id, kind, expires_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(entity_kind, entity_id, kind) DO UPDATE SET
                 expires_at = excluded.expires_at"#,
        )
        .bind(entity_kind.as_str())
        .bind(entity_id as i64)
        .bind(kind.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_sanction(
        &self,
        entity_kind: EntityKind,
        entity_id: u64,
        kind: SanctionKind,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM sanctions WHERE entity_kind = ? AND entity_id = ? AND kind = ?",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id as i64)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SanctionStore for SqliteSanctions {
    async fn has_active_sanction(
        &self,
        entity_kind: EntityKind,
        entity_id: u64,
        kind: SanctionKind,
    ) -> Result<bool> {
        let hits: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM sanctions
               WHERE entity_kind = ? AND entity_id = ? AND kind = ?
                 AND (expires_at IS NULL OR expires_at > ?)"#,
        )
        .bind(entity_kind.as_str())
        .bind(entity_id as i64)
        .bind(kind.as_str())
        .bind(unix_now())
        .fetch_one(&self.pool)
        .await?;
        Ok(hits > 0)
    }
}

/// SQLite-backed welcome ledger.
#[derive(Clone)]
pub struct SqliteWelcomeLedger {
    pool: SqlitePool,
}

impl SqliteWelcomeLedger {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the welcome ledger schema.
    ///
    /// Schema is managed by [`crate::run_migrations`] in deployments.
    /// This method is retained for tests that use in-memory databases.
    #[doc(hidden)]
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS relay_welcomes (
                user_id     INTEGER NOT NULL,
                kind        TEXT    NOT NULL,
                welcomed_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, kind)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WelcomeLedger for SqliteWelcomeLedger {
    async fn was_welcomed(&self, user_id: UserId, kind: RelayKind) -> Result<bool> {
        let hits: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM relay_welcomes WHERE user_id = ? AND kind = ?",
        )
        .bind(user_id as i64)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(hits > 0)
    }

    async fn mark_welcomed(&self, user_id: UserId, kind: RelayKind) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO relay_welcomes (user_id, kind, welcomed_at)
               VALUES (?, ?, ?)
               ON CONFLICT(user_id, kind) DO NOTHING"#,
        )
        .bind(user_id as i64)
        .bind(kind.as_str())
        .bind(unix_now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn log_store() -> SqliteRelayLog {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteRelayLog::init(&pool).await.unwrap();
        SqliteRelayLog::new(pool)
    }

    fn record(id: &str, origin_message_id: MessageId) -> RelayRecord {
        RelayRecord {
            id: RelayId::parse(id).unwrap(),
            kind: RelayKind::French,
            origin_guild_id: 1,
            origin_channel_id: 10,
            origin_message_id,
            author_id: 7,
            author_name: "Alice".into(),
            content: "bonjour".into(),
            privileged: true,
            status: RelayStatus::Active,
            created_at: 1_000,
        }
    }

    #[tokio::test]
    async fn test_record_roundtrip() {
        let store = log_store().await;
        let rec = record("AAAA1111", 100);
        store.create_relay_record(&rec).await.unwrap();

        let got = store.get_relay_record(rec.id).await.unwrap().unwrap();
        assert_eq!(got, rec);
        assert!(store.get_relay_record_by_origin(100).await.unwrap().is_some());
        assert!(store.get_relay_record_by_origin(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_a_conflict() {
        let store = log_store().await;
        let rec = record("AAAA1111", 100);
        store.create_relay_record(&rec).await.unwrap();
        assert!(matches!(
            store.create_relay_record(&rec).await,
            Err(Error::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_deliveries_upsert_per_guild() {
        let store = log_store().await;
        let rec = record("AAAA1111", 100);
        store.create_relay_record(&rec).await.unwrap();

        let delivery = RelayDelivery {
            relay_id: rec.id,
            guild_id: 2,
            channel_id: 20,
            message_id: 900,
        };
        store.add_delivery(&delivery).await.unwrap();
        store
            .add_delivery(&RelayDelivery {
                message_id: 901,
                ..delivery
            })
            .await
            .unwrap();
        store
            .add_delivery(&RelayDelivery {
                guild_id: 3,
                channel_id: 30,
                message_id: 902,
                ..delivery
            })
            .await
            .unwrap();

        let deliveries = store.deliveries(rec.id).await.unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].message_id, 901);
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let store = log_store().await;
        let rec = record("AAAA1111", 100);
        store.create_relay_record(&rec).await.unwrap();
        store.mark_deleted(rec.id).await.unwrap();

        let got = store.get_relay_record(rec.id).await.unwrap().unwrap();
        assert_eq!(got.status, RelayStatus::Deleted);
    }

    #[tokio::test]
    async fn test_module_configs() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteModuleConfigs::init(&pool).await.unwrap();
        let store = SqliteModuleConfigs::new(pool);

        store
            .save_module_config(1, "relay_english", &serde_json::json!({"channel_id": 10}))
            .await
            .unwrap();
        store
            .save_module_config(1, "relay_english", &serde_json::json!({"channel_id": 11}))
            .await
            .unwrap();

        let got = store
            .get_module_config(1, "relay_english")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got["channel_id"], 11);

        let all = store.all_module_configs(1).await.unwrap();
        assert_eq!(all.len(), 1);

        store.delete_module_config(1, "relay_english").await.unwrap();
        assert!(
            store
                .get_module_config(1, "relay_english")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_sanction_expiry() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteSanctions::init(&pool).await.unwrap();
        let store = SqliteSanctions::new(pool);

        store
            .record_sanction(EntityKind::User, 7, SanctionKind::RelayBlacklist, None)
            .await
            .unwrap();
        assert!(
            store
                .has_active_sanction(EntityKind::User, 7, SanctionKind::RelayBlacklist)
                .await
                .unwrap()
        );

        // Re-record with a past expiry; no longer active.
        store
            .record_sanction(
                EntityKind::User,
                7,
                SanctionKind::RelayBlacklist,
                Some(unix_now() - 60),
            )
            .await
            .unwrap();
        assert!(
            !store
                .has_active_sanction(EntityKind::User, 7, SanctionKind::RelayBlacklist)
                .await
                .unwrap()
        );

        store
            .clear_sanction(EntityKind::User, 7, SanctionKind::RelayBlacklist)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_welcome_mark_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteWelcomeLedger::init(&pool).await.unwrap();
        let ledger = SqliteWelcomeLedger::new(pool);

        assert!(!ledger.was_welcomed(7, RelayKind::English).await.unwrap());
        ledger.mark_welcomed(7, RelayKind::English).await.unwrap();
        ledger.mark_welcomed(7, RelayKind::English).await.unwrap();
        assert!(ledger.was_welcomed(7, RelayKind::English).await.unwrap());
    }
}
