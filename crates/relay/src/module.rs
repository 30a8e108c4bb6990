//! The relay as a guild module, one type per relay kind.

use std::any::Any;

use {
    async_trait::async_trait,
    serde_json::{Value, json},
    tracing::info,
};

use {
    guildlink_common::{GuildId, RelayKind},
    guildlink_modules::{Error, GuildModule, ModuleDescriptor, ModuleManager, Result},
    guildlink_platform::Platform,
};

use crate::config::RelayConfig;

/// A guild's membership in one relay kind. Enabled once a valid config
/// is live; the config is read by the topology resolver on every event.
pub struct RelayModule {
    kind: RelayKind,
    config: Option<RelayConfig>,
}

impl RelayModule {
    #[must_use]
    pub fn new(kind: RelayKind) -> Self {
        Self { kind, config: None }
    }

    #[must_use]
    pub fn kind(&self) -> RelayKind {
        self.kind
    }

    #[must_use]
    pub fn config(&self) -> Option<&RelayConfig> {
        self.config.as_ref()
    }

    /// Registers one module type per relay kind.
    pub fn register_all(manager: &ModuleManager) {
        for kind in RelayKind::ALL {
            manager.register(move |_| Box::new(RelayModule::new(kind)));
        }
    }
}

#[async_trait]
impl GuildModule for RelayModule {
    fn descriptor(&self) -> ModuleDescriptor {
        let (name, summary) = match self.kind {
            RelayKind::English => (
                "English Relay",
                "shares a channel with every guild on the English relay",
            ),
            RelayKind::French => (
                "French Relay",
                "shares a channel with every guild on the French relay",
            ),
        };
        ModuleDescriptor {
            id: self.kind.module_id(),
            name,
            summary,
        }
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["channel_id"]
    }

    fn default_config(&self) -> Value {
        json!({
            "show_origin_name": true,
            "show_avatar": true,
            "allow_mentions": false,
        })
    }

    fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn load_config(&mut self, config: &Value) -> Result<()> {
        if config.is_null() || config.as_object().is_some_and(|map| map.is_empty()) {
            self.config = None;
            return Ok(());
        }
        self.config = Some(serde_json::from_value(config.clone())?);
        Ok(())
    }

    async fn validate_config(
        &self,
        guild_id: GuildId,
        config: &Value,
        platform: &dyn Platform,
    ) -> Result<()> {
        let parsed: RelayConfig = serde_json::from_value(config.clone())?;
        let Some(permissions) = platform
            .channel_permissions(guild_id, parsed.channel_id)
            .await
        else {
            return Err(Error::invalid_config(format!(
                "channel {} does not exist in this guild",
                parsed.channel_id
            )));
        };
        if !permissions.can_send {
            return Err(Error::invalid_config(format!(
                "cannot send messages in channel {}",
                parsed.channel_id
            )));
        }
        if !permissions.can_manage_sinks {
            return Err(Error::invalid_config(format!(
                "cannot manage webhooks in channel {}",
                parsed.channel_id
            )));
        }
        Ok(())
    }

    async fn on_enable(&self, guild_id: GuildId) {
        info!(guild_id, kind = self.kind.as_str(), "relay enabled");
    }

    async fn on_disable(&self, guild_id: GuildId) {
        info!(guild_id, kind = self.kind.as_str(), "relay disabled");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
