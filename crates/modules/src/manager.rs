use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    dashmap::DashMap,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use {
    guildlink_common::GuildId,
    guildlink_platform::Platform,
    guildlink_store::ModuleConfigStore,
};

use crate::{
    error::{Error, Result},
    module::{GuildModule, ModuleDescriptor},
};

type Ctor = Box<dyn Fn(GuildId) -> Box<dyn GuildModule> + Send + Sync>;

struct RegisteredModule {
    descriptor: ModuleDescriptor,
    ctor: Ctor,
}

/// Registry of module types and the authoritative map of live instances.
///
/// Instances are keyed by (guild, module id) and are only ever created,
/// replaced, or removed through [`save_config`](Self::save_config) and
/// [`delete_config`](Self::delete_config), so a held [`Arc`] always
/// reflects a config that was valid when it went live.
pub struct ModuleManager {
    registered: RwLock<HashMap<String, RegisteredModule>>,
    active: DashMap<(GuildId, String), Arc<dyn GuildModule>>,
    configs: Arc<dyn ModuleConfigStore>,
    platform: Arc<dyn Platform>,
}

impl ModuleManager {
    #[must_use]
    pub fn new(configs: Arc<dyn ModuleConfigStore>, platform: Arc<dyn Platform>) -> Self {
        Self {
            registered: RwLock::new(HashMap::new()),
            active: DashMap::new(),
            configs,
            platform,
        }
    }

    /// Register a module type under the id its descriptor declares.
    /// Registering the same id twice replaces the earlier type.
    pub fn register<F>(&self, ctor: F)
    where
        F: Fn(GuildId) -> Box<dyn GuildModule> + Send + Sync + 'static,
    {
        // Descriptors are static per type; probe a throwaway instance.
        let descriptor = ctor(0).descriptor();
        let mut registered = self.registered.write().unwrap_or_else(|e| e.into_inner());
        let previous = registered.insert(
            descriptor.id.to_string(),
            RegisteredModule {
                descriptor,
                ctor: Box::new(ctor),
            },
        );
        if previous.is_some() {
            warn!(module_id = descriptor.id, "module registered twice, replacing");
        }
    }

    /// Load every persisted module config for one guild and bring the
    /// valid ones live. Configs for unregistered module ids are skipped,
    /// as are configs the module itself refuses to load.
    pub async fn load_guild(&self, guild_id: GuildId) -> Result<()> {
        for entry in self.configs.all_module_configs(guild_id).await? {
            let mut instance = {
                let registered = self.registered.read().unwrap_or_else(|e| e.into_inner());
                let Some(module) = registered.get(&entry.module_id) else {
                    debug!(
                        guild_id,
                        module_id = %entry.module_id,
                        "skipping stored config for unregistered module"
                    );
                    continue;
                };
                (module.ctor)(guild_id)
            };
            if let Err(error) = instance.load_config(&entry.config) {
                warn!(
                    guild_id,
                    module_id = %entry.module_id,
                    %error,
                    "stored module config failed to load, skipping"
                );
                continue;
            }
            let live: Arc<dyn GuildModule> = Arc::from(instance);
            self.active
                .insert((guild_id, entry.module_id.clone()), Arc::clone(&live));
            if live.enabled() {
                live.on_enable(guild_id).await;
            }
        }
        Ok(())
    }

    /// Load modules for every guild the platform reports. One guild's
    /// store failure does not stop the rest from loading.
    pub async fn load_all(&self) {
        for guild_id in self.platform.guild_ids().await {
            if let Err(error) = self.load_guild(guild_id).await {
                warn!(guild_id, %error, "failed to load modules for guild");
            }
        }
    }

    /// Validate, persist, and live-swap a module config.
    ///
    /// Runs the required-fields check, then the module's own
    /// `validate_config`, then persists. Any failure returns a structured
    /// reason and leaves both the store and the live instance untouched.
    pub async fn save_config(
        &self,
        guild_id: GuildId,
        module_id: &str,
        config: &Value,
    ) -> Result<()> {
        let mut candidate = self.construct(guild_id, module_id)?;

        let missing: Vec<String> = candidate
            .required_fields()
            .iter()
            .filter(|field| config.get(**field).is_none_or(Value::is_null))
            .map(|field| (*field).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFields { fields: missing });
        }

        candidate
            .validate_config(guild_id, config, self.platform.as_ref())
            .await?;
        candidate.load_config(config)?;

        self.configs
            .save_module_config(guild_id, module_id, config)
            .await?;

        let live: Arc<dyn GuildModule> = Arc::from(candidate);
        let previous = self
            .active
            .insert((guild_id, module_id.to_string()), Arc::clone(&live));
        if let Some(previous) = previous {
            previous.on_disable(guild_id).await;
        }
        if live.enabled() {
            live.on_enable(guild_id).await;
        }
        info!(guild_id, module_id, enabled = live.enabled(), "module config saved");
        Ok(())
    }

    /// Clear a module's persisted config and take its instance out of
    /// service. Succeeds even when nothing is currently live, and does
    /// not require the module id to still be registered.
    pub async fn delete_config(&self, guild_id: GuildId, module_id: &str) -> Result<()> {
        self.configs
            .delete_module_config(guild_id, module_id)
            .await?;
        if let Some((_, previous)) = self.active.remove(&(guild_id, module_id.to_string())) {
            previous.on_disable(guild_id).await;
        }
        info!(guild_id, module_id, "module config cleared");
        Ok(())
    }

    /// Live instance lookup. Returns `None` when the module is not
    /// loaded for the guild or its config leaves it disabled.
    #[must_use]
    pub fn instance(&self, guild_id: GuildId, module_id: &str) -> Option<Arc<dyn GuildModule>> {
        self.active
            .get(&(guild_id, module_id.to_string()))
            .map(|entry| Arc::clone(entry.value()))
            .filter(|module| module.enabled())
    }

    /// Descriptors of every registered module type, sorted by id.
    #[must_use]
    pub fn available(&self) -> Vec<ModuleDescriptor> {
        let registered = self.registered.read().unwrap_or_else(|e| e.into_inner());
        let mut descriptors: Vec<_> = registered.values().map(|m| m.descriptor).collect();
        descriptors.sort_by_key(|d| d.id);
        descriptors
    }

    fn construct(&self, guild_id: GuildId, module_id: &str) -> Result<Box<dyn GuildModule>> {
        let registered = self.registered.read().unwrap_or_else(|e| e.into_inner());
        let module = registered
            .get(module_id)
            .ok_or_else(|| Error::unknown_module(module_id))?;
        Ok((module.ctor)(guild_id))
    }
}
