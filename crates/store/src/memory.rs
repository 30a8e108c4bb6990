//! In-memory stores for testing.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use guildlink_common::{GuildId, MessageId, RelayId, RelayKind, UserId, unix_now};

use crate::{
    error::{Error, Result},
    store::{ModuleConfigStore, RelayLogStore, SanctionStore, WelcomeLedger},
    types::{EntityKind, RelayDelivery, RelayRecord, RelayStatus, SanctionKind, StoredModuleConfig},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Relay log backed by `HashMap`. No persistence, tests only.
#[derive(Default)]
pub struct MemoryRelayLog {
    records: Mutex<HashMap<RelayId, RelayRecord>>,
    deliveries: Mutex<Vec<RelayDelivery>>,
}

impl MemoryRelayLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelayLogStore for MemoryRelayLog {
    async fn create_relay_record(&self, record: &RelayRecord) -> Result<()> {
        let mut records = lock(&self.records);
        if records.contains_key(&record.id) {
            return Err(Error::conflict(format!("relay id {}", record.id)));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_relay_record(&self, id: RelayId) -> Result<Option<RelayRecord>> {
        Ok(lock(&self.records).get(&id).cloned())
    }

    async fn get_relay_record_by_origin(
        &self,
        origin_message_id: MessageId,
    ) -> Result<Option<RelayRecord>> {
        Ok(lock(&self.records)
            .values()
            .filter(|r| r.origin_message_id == origin_message_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn add_delivery(&self, delivery: &RelayDelivery) -> Result<()> {
        let mut deliveries = lock(&self.deliveries);
        deliveries.retain(|d| !(d.relay_id == delivery.relay_id && d.guild_id == delivery.guild_id));
        deliveries.push(*delivery);
        Ok(())
    }

    async fn deliveries(&self, id: RelayId) -> Result<Vec<RelayDelivery>> {
        Ok(lock(&self.deliveries)
            .iter()
            .filter(|d| d.relay_id == id)
            .copied()
            .collect())
    }

    async fn mark_deleted(&self, id: RelayId) -> Result<()> {
        if let Some(record) = lock(&self.records).get_mut(&id) {
            record.status = RelayStatus::Deleted;
        }
        Ok(())
    }
}

/// Module config store backed by `HashMap`. For tests only.
#[derive(Default)]
pub struct MemoryModuleConfigs {
    configs: Mutex<HashMap<(GuildId, String), StoredModuleConfig>>,
    fail_saves: AtomicBool,
}

impl MemoryModuleConfigs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every save fail, to exercise no-partial-apply paths.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl ModuleConfigStore for MemoryModuleConfigs {
    async fn get_module_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(lock(&self.configs)
            .get(&(guild_id, module_id.to_string()))
            .map(|c| c.config.clone()))
    }

    async fn save_module_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
        config: &serde_json::Value,
    ) -> Result<()> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(Error::unavailable("saves disabled"));
        }
        lock(&self.configs).insert(
            (guild_id, module_id.to_string()),
            StoredModuleConfig {
                guild_id,
                module_id: module_id.to_string(),
                config: config.clone(),
                updated_at: unix_now(),
            },
        );
        Ok(())
    }

    async fn delete_module_config(&self, guild_id: GuildId, module_id: &str) -> Result<()> {
        lock(&self.configs).remove(&(guild_id, module_id.to_string()));
        Ok(())
    }

    async fn all_module_configs(&self, guild_id: GuildId) -> Result<Vec<StoredModuleConfig>> {
        let mut configs: Vec<StoredModuleConfig> = lock(&self.configs)
            .values()
            .filter(|c| c.guild_id == guild_id)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        Ok(configs)
    }
}

/// Sanction store backed by `HashSet`. For tests only.
#[derive(Default)]
pub struct MemorySanctions {
    sanctions: Mutex<HashSet<(EntityKind, u64, SanctionKind)>>,
    failing: AtomicBool,
}

impl MemorySanctions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sanction(&self, entity_kind: EntityKind, entity_id: u64, kind: SanctionKind) {
        lock(&self.sanctions).insert((entity_kind, entity_id, kind));
    }

    pub fn lift(&self, entity_kind: EntityKind, entity_id: u64, kind: SanctionKind) {
        lock(&self.sanctions).remove(&(entity_kind, entity_id, kind));
    }

    /// Simulates a moderation-store outage.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl SanctionStore for MemorySanctions {
    async fn has_active_sanction(
        &self,
        entity_kind: EntityKind,
        entity_id: u64,
        kind: SanctionKind,
    ) -> Result<bool> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::unavailable("sanction store offline"));
        }
        Ok(lock(&self.sanctions).contains(&(entity_kind, entity_id, kind)))
    }
}

/// Welcome ledger backed by `HashSet`. For tests only.
#[derive(Default)]
pub struct MemoryWelcomeLedger {
    welcomed: Mutex<HashSet<(UserId, RelayKind)>>,
}

impl MemoryWelcomeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WelcomeLedger for MemoryWelcomeLedger {
    async fn was_welcomed(&self, user_id: UserId, kind: RelayKind) -> Result<bool> {
        Ok(lock(&self.welcomed).contains(&(user_id, kind)))
    }

    async fn mark_welcomed(&self, user_id: UserId, kind: RelayKind) -> Result<()> {
        lock(&self.welcomed).insert((user_id, kind));
        Ok(())
    }
}
