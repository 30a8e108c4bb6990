//! Shared identifiers and vocabulary for the guildlink workspace.

pub mod relay_id;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use relay_id::{ParseRelayIdError, RelayId};

/// Platform-native snowflake of a guild (community).
pub type GuildId = u64;
/// Platform-native snowflake of a text channel.
pub type ChannelId = u64;
/// Platform-native snowflake of a message.
pub type MessageId = u64;
/// Platform-native snowflake of a user account.
pub type UserId = u64;

/// Seconds since the unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// The cross-community relays a guild can join. Each kind is an isolated
/// network; messages never cross kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayKind {
    English,
    French,
}

impl RelayKind {
    pub const ALL: [RelayKind; 2] = [RelayKind::English, RelayKind::French];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::French => "french",
        }
    }

    /// Id of the guild module that carries this relay's configuration.
    #[must_use]
    pub fn module_id(&self) -> &'static str {
        match self {
            Self::English => "relay_english",
            Self::French => "relay_french",
        }
    }

    /// Maps a module id back to its relay kind.
    #[must_use]
    pub fn from_module_id(module_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.module_id() == module_id)
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayKind {
    type Err = UnknownRelayKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "english" => Ok(Self::English),
            "french" => Ok(Self::French),
            other => Err(UnknownRelayKind(other.to_string())),
        }
    }
}

/// A relay kind string that no built-in relay answers to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown relay kind: {0}")]
pub struct UnknownRelayKind(pub String);
