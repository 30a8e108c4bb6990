//! Message and permission types crossing the platform seam.

use serde::{Deserialize, Serialize};

use guildlink_common::{ChannelId, GuildId, MessageId, UserId};

/// Platform id of an outbound sink (a named webhook on a channel).
pub type SinkId = u64;

/// Author of an inbound message, as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

/// A file attached to a message. Relayed by reference, never re-uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub spoiler: bool,
}

/// One message event as the embedding transport hands it to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author: Author,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
    /// Message this one replies to, when the platform reported one.
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

impl InboundMessage {
    /// True when there is nothing to relay.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty() && self.embeds.is_empty()
    }
}

/// Where a relayed reply should point inside one destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyTarget {
    /// The replied-to message has a delivered copy in this destination.
    Local {
        channel_id: ChannelId,
        message_id: MessageId,
    },
    /// No local copy; fall back to a link to the origin message.
    Link { url: String },
}

/// A fully rendered message, ready for one destination's sink.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    /// Name the sink impersonates for this delivery.
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub attachments: Vec<AttachmentRef>,
    pub embeds: Vec<serde_json::Value>,
    /// Whether the delivered content may ping members of the destination.
    pub allow_mentions: bool,
    pub reply: Option<ReplyTarget>,
}

/// Outcome marker the transport attaches to the origin message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayAck {
    Delivered,
    Failed,
    Rejected,
}

/// What the relay must be allowed to do in a channel before it can use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelPermissions {
    pub can_send: bool,
    pub can_manage_sinks: bool,
}

impl ChannelPermissions {
    /// Full permissions, the common case in tests.
    #[must_use]
    pub fn full() -> Self {
        Self {
            can_send: true,
            can_manage_sinks: true,
        }
    }

    #[must_use]
    pub fn usable(&self) -> bool {
        self.can_send && self.can_manage_sinks
    }
}

/// Permanent link to a message, used when a reply has no local copy.
#[must_use]
pub fn message_url(guild_id: GuildId, channel_id: ChannelId, message_id: MessageId) -> String {
    format!("https://discord.com/channels/{guild_id}/{channel_id}/{message_id}")
}
