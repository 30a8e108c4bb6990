//! Persisted record types.

use serde::{Deserialize, Serialize};

use guildlink_common::{ChannelId, GuildId, MessageId, RelayId, RelayKind, UserId};

/// Lifecycle of a relay message record.
///
/// Records are never removed; a takedown or origin deletion flips the
/// status to [`RelayStatus::Deleted`] and the row stays for staff lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Active,
    Deleted,
}

impl RelayStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

/// Snapshot of one relayed origin message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRecord {
    /// Opaque public id, the only identifier staff tooling shows.
    pub id: RelayId,
    pub kind: RelayKind,
    pub origin_guild_id: GuildId,
    pub origin_channel_id: ChannelId,
    pub origin_message_id: MessageId,
    pub author_id: UserId,
    /// Author display name at send time.
    pub author_name: String,
    /// Content at send time; later edits are not tracked.
    pub content: String,
    /// Whether the author was a privileged sender when this was relayed.
    pub privileged: bool,
    pub status: RelayStatus,
    pub created_at: i64,
}

/// One delivered copy of a relayed message in a destination guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDelivery {
    pub relay_id: RelayId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// A module config blob as persisted for one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModuleConfig {
    pub guild_id: GuildId,
    pub module_id: String,
    pub config: serde_json::Value,
    pub updated_at: i64,
}

/// What a sanction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Guild,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guild => "guild",
        }
    }
}

/// Sanction kinds the relay consults. Written by the moderation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    /// Excluded from every relay kind.
    RelayBlacklist,
}

impl SanctionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelayBlacklist => "relay_blacklist",
        }
    }
}
