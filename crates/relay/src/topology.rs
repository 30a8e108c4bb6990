use std::sync::Arc;

use tracing::debug;

use {
    guildlink_common::{ChannelId, GuildId, RelayKind},
    guildlink_modules::ModuleManager,
    guildlink_platform::Platform,
};

use crate::{config::RelayConfig, module::RelayModule};

/// One eligible destination, resolved live from a guild's config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub guild_id: GuildId,
    pub guild_name: String,
    pub channel_id: ChannelId,
    pub show_origin_name: bool,
    pub show_avatar: bool,
    pub allow_mentions: bool,
}

/// Resolves the destination set from live module and platform state on
/// every relay event. No caching: guild joins, leaves, reconfigures and
/// permission changes take effect on the next message.
pub struct TopologyResolver {
    modules: Arc<ModuleManager>,
    platform: Arc<dyn Platform>,
}

impl TopologyResolver {
    #[must_use]
    pub fn new(modules: Arc<ModuleManager>, platform: Arc<dyn Platform>) -> Self {
        Self { modules, platform }
    }

    /// Every participating guild of the kind other than the origin whose
    /// configured channel still resolves with full relay permissions.
    pub async fn resolve_destinations(
        &self,
        origin_guild_id: GuildId,
        kind: RelayKind,
    ) -> Vec<Destination> {
        let mut destinations = Vec::new();
        for guild_id in self.platform.guild_ids().await {
            if guild_id == origin_guild_id {
                continue;
            }
            let Some(config) = self.relay_config(guild_id, kind) else {
                continue;
            };
            let permissions = self
                .platform
                .channel_permissions(guild_id, config.channel_id)
                .await;
            if !permissions.is_some_and(|p| p.usable()) {
                debug!(
                    guild_id,
                    kind = kind.as_str(),
                    channel_id = config.channel_id,
                    "destination channel unusable, skipping"
                );
                continue;
            }
            let guild_name = self
                .platform
                .guild_name(guild_id)
                .await
                .unwrap_or_else(|| guild_id.to_string());
            destinations.push(Destination {
                guild_id,
                guild_name,
                channel_id: config.channel_id,
                show_origin_name: config.show_origin_name,
                show_avatar: config.show_avatar,
                allow_mentions: config.allow_mentions,
            });
        }
        destinations
    }

    /// The relay kind a guild channel is configured for, when any.
    #[must_use]
    pub fn kind_for_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<RelayKind> {
        RelayKind::ALL.into_iter().find(|kind| {
            self.relay_config(guild_id, *kind)
                .is_some_and(|config| config.channel_id == channel_id)
        })
    }

    fn relay_config(&self, guild_id: GuildId, kind: RelayKind) -> Option<RelayConfig> {
        let instance = self.modules.instance(guild_id, kind.module_id())?;
        let module = instance.as_any().downcast_ref::<RelayModule>()?;
        module.config().cloned()
    }
}
