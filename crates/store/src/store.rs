//! Storage traits the relay engine is programmed against.

use async_trait::async_trait;

use guildlink_common::{GuildId, MessageId, RelayId, RelayKind, UserId};

use crate::{
    error::Result,
    types::{EntityKind, RelayDelivery, RelayRecord, SanctionKind, StoredModuleConfig},
};

/// Append-mostly log of relayed messages and their delivered copies.
#[async_trait]
pub trait RelayLogStore: Send + Sync {
    /// Persists a fresh origin record. The id must not already exist.
    async fn create_relay_record(&self, record: &RelayRecord) -> Result<()>;

    async fn get_relay_record(&self, id: RelayId) -> Result<Option<RelayRecord>>;

    /// Looks a record up by the platform id of its origin message.
    async fn get_relay_record_by_origin(
        &self,
        origin_message_id: MessageId,
    ) -> Result<Option<RelayRecord>>;

    /// Records one delivered copy. Re-delivery to the same guild replaces
    /// the previous entry.
    async fn add_delivery(&self, delivery: &RelayDelivery) -> Result<()>;

    async fn deliveries(&self, id: RelayId) -> Result<Vec<RelayDelivery>>;

    /// Soft delete: flips the record status, keeps the row.
    async fn mark_deleted(&self, id: RelayId) -> Result<()>;
}

/// Per-guild module configuration blobs.
#[async_trait]
pub trait ModuleConfigStore: Send + Sync {
    async fn get_module_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
    ) -> Result<Option<serde_json::Value>>;

    async fn save_module_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
        config: &serde_json::Value,
    ) -> Result<()>;

    /// Clears the persisted config. Succeeds when none exists.
    async fn delete_module_config(&self, guild_id: GuildId, module_id: &str) -> Result<()>;

    async fn all_module_configs(&self, guild_id: GuildId) -> Result<Vec<StoredModuleConfig>>;
}

/// Read side of the moderation system's sanction table.
#[async_trait]
pub trait SanctionStore: Send + Sync {
    /// Whether an unexpired sanction of the kind is on record.
    async fn has_active_sanction(
        &self,
        entity_kind: EntityKind,
        entity_id: u64,
        kind: SanctionKind,
    ) -> Result<bool>;
}

/// Tracks which authors already received the first-send welcome notice.
#[async_trait]
pub trait WelcomeLedger: Send + Sync {
    async fn was_welcomed(&self, user_id: UserId, kind: RelayKind) -> Result<bool>;

    async fn mark_welcomed(&self, user_id: UserId, kind: RelayKind) -> Result<()>;
}
