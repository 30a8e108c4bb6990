use std::any::Any;

use {async_trait::async_trait, serde_json::Value};

use {
    guildlink_common::GuildId,
    guildlink_platform::Platform,
};

use crate::error::Result;

/// Static description of a module, shown by configuration surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Stable identifier, also the persistence key (e.g. "relay_english").
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// One-line description of what the module does.
    pub summary: &'static str,
}

/// Core guild module trait. Each per-guild feature implements this.
///
/// One instance exists per (guild, module id). Instances are created and
/// mutated only through the [`crate::ModuleManager`] save/delete path.
#[async_trait]
pub trait GuildModule: Send + Sync + 'static {
    fn descriptor(&self) -> ModuleDescriptor;

    /// Config keys that must be present before the manager will save.
    fn required_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Template config offered to configuration surfaces.
    fn default_config(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Whether this instance is ready to act on events.
    fn enabled(&self) -> bool;

    /// Apply a persisted config to this instance.
    ///
    /// A `null` or empty config leaves the module disabled and is not
    /// an error.
    fn load_config(&mut self, config: &Value) -> Result<()>;

    /// Domain checks beyond key presence, with platform access for
    /// existence and permission lookups. Runs before a config is saved.
    async fn validate_config(
        &self,
        _guild_id: GuildId,
        _config: &Value,
        _platform: &dyn Platform,
    ) -> Result<()> {
        Ok(())
    }

    /// Called after the instance goes live with an enabled config.
    async fn on_enable(&self, _guild_id: GuildId) {}

    /// Called after the instance is removed or replaced.
    async fn on_disable(&self, _guild_id: GuildId) {}

    /// Downcast support for modules exposing extra surface.
    fn as_any(&self) -> &dyn Any;
}
