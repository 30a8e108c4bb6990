//! Per-guild relay preferences and process-wide engine tuning.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use guildlink_common::{ChannelId, RelayKind, UserId};

fn default_true() -> bool {
    true
}

/// One guild's relay membership, persisted as its module config.
///
/// Display flags are applied on the receiving side: they control what
/// this guild shows its own members, not how its messages appear
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Channel the guild reads and writes the shared feed through.
    pub channel_id: ChannelId,
    #[serde(default = "default_true")]
    pub show_origin_name: bool,
    #[serde(default = "default_true")]
    pub show_avatar: bool,
    /// Whether relayed content may ping members of this guild.
    #[serde(default)]
    pub allow_mentions: bool,
}

/// Engine tuning, read once at startup from the service config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum seconds between accepted sends per author.
    pub cooldown_secs: u64,
    /// Destinations delivered to concurrently.
    pub fanout_concurrency: usize,
    /// Per-destination send budget in milliseconds.
    pub send_timeout_ms: u64,
    /// Authors exempt from cooldown and destination restriction checks.
    pub privileged_senders: HashSet<UserId>,
    /// Staff audit channel per relay kind.
    pub staff_channels: HashMap<RelayKind, ChannelId>,
    /// Channel user reports are posted to.
    pub report_channel: Option<ChannelId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 3,
            fanout_concurrency: 8,
            send_timeout_ms: 10_000,
            privileged_senders: HashSet::new(),
            staff_channels: HashMap::new(),
            report_channel: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    #[must_use]
    pub fn is_privileged(&self, user_id: UserId) -> bool {
        self.privileged_senders.contains(&user_id)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn relay_config_fills_display_defaults() {
        let config: RelayConfig = serde_json::from_value(json!({"channel_id": 42})).unwrap();
        assert_eq!(config.channel_id, 42);
        assert!(config.show_origin_name);
        assert!(config.show_avatar);
        assert!(!config.allow_mentions);
    }

    #[test]
    fn relay_config_requires_a_channel() {
        assert!(serde_json::from_value::<RelayConfig>(json!({"show_avatar": false})).is_err());
    }

    #[test]
    fn engine_config_defaults_from_empty_input() {
        let config: EngineConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.cooldown(), Duration::from_secs(3));
        assert_eq!(config.send_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.fanout_concurrency, 8);
        assert!(config.report_channel.is_none());
    }

    #[test]
    fn staff_channels_key_on_kind_names() {
        let config: EngineConfig = serde_json::from_value(json!({
            "privileged_senders": [7],
            "staff_channels": {"english": 555},
        }))
        .unwrap();
        assert!(config.is_privileged(7));
        assert!(!config.is_privileged(8));
        assert_eq!(config.staff_channels.get(&RelayKind::English), Some(&555));
    }
}
