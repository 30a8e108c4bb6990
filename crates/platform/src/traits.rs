//! Capability traits the relay engine is programmed against.

use async_trait::async_trait;

use guildlink_common::{ChannelId, GuildId, MessageId, UserId};

use crate::{
    error::Result,
    types::{ChannelPermissions, OutboundMessage, RelayAck, SinkId},
};

/// Read-only view of the guilds the process currently serves.
///
/// Answers are live; callers must not cache them across messages, because
/// guilds join and leave and permissions change under the engine.
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    /// Every guild currently visible to the process.
    async fn guild_ids(&self) -> Vec<GuildId>;

    /// Human-readable guild name, `None` when the guild is unknown.
    async fn guild_name(&self, guild_id: GuildId) -> Option<String>;

    /// Effective bot permissions in a channel, `None` when the channel
    /// does not resolve in that guild.
    async fn channel_permissions(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Option<ChannelPermissions>;

    /// Whether the member is banned or timed out in the guild.
    async fn is_member_restricted(&self, guild_id: GuildId, user_id: UserId) -> Result<bool>;
}

/// Named outbound sinks used for impersonated delivery.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Returns the relay's sink for a channel, creating it when absent.
    /// Must be idempotent: repeated calls yield the same sink.
    async fn get_or_create_sink(&self, guild_id: GuildId, channel_id: ChannelId)
    -> Result<SinkId>;

    /// Delivers one rendered message through a sink and returns the id of
    /// the created message.
    async fn send(&self, sink: SinkId, message: OutboundMessage) -> Result<MessageId>;
}

/// Plain message operations performed as the bot user.
#[async_trait]
pub trait MessageOps: Send + Sync {
    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;

    /// Attaches the relay outcome marker to the origin message.
    async fn mark_origin(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        ack: RelayAck,
    ) -> Result<()>;

    /// Posts a plain notice to a channel as the bot user.
    async fn post_notice(&self, channel_id: ChannelId, text: &str) -> Result<MessageId>;

    async fn send_dm(&self, user_id: UserId, text: &str) -> Result<()>;
}

/// Everything the relay engine needs from the chat platform.
pub trait Platform: GuildDirectory + Outbound + MessageOps {}

impl<T: GuildDirectory + Outbound + MessageOps> Platform for T {}
