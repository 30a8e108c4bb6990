//! Recording in-memory platform. No persistence, tests only.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;

use guildlink_common::{ChannelId, GuildId, MessageId, UserId};

use crate::{
    error::{Error, Result},
    traits::{GuildDirectory, MessageOps, Outbound},
    types::{ChannelPermissions, OutboundMessage, RelayAck, SinkId},
};

/// One delivery captured by [`InMemoryPlatform::sends`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub sink: SinkId,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub message: OutboundMessage,
}

struct GuildEntry {
    name: String,
    channels: HashMap<ChannelId, ChannelPermissions>,
}

#[derive(Default)]
struct State {
    guilds: BTreeMap<GuildId, GuildEntry>,
    restricted: HashSet<(GuildId, UserId)>,
    restriction_errors: HashSet<GuildId>,
    sinks: HashMap<(GuildId, ChannelId), SinkId>,
    sink_targets: HashMap<SinkId, (GuildId, ChannelId)>,
    sink_requests: u64,
    failing_sink_channels: HashSet<ChannelId>,
    failing_channels: HashSet<ChannelId>,
    slow_channels: HashMap<ChannelId, Duration>,
    failing_dms: HashSet<UserId>,
    next_sink: SinkId,
    next_message: MessageId,
    sends: Vec<SentMessage>,
    deleted: Vec<(ChannelId, MessageId)>,
    acks: Vec<(ChannelId, MessageId, RelayAck)>,
    notices: Vec<(ChannelId, String)>,
    dms: Vec<(UserId, String)>,
}

/// In-memory platform fake that records every outbound interaction.
///
/// Delivered message ids start at 90_000 so they never collide with the
/// origin ids tests pick by hand.
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_sink: 500,
                next_message: 90_000,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Topology setup ───────────────────────────────────────────────

    pub fn add_guild(&self, guild_id: GuildId, name: &str) {
        self.lock().guilds.insert(
            guild_id,
            GuildEntry {
                name: name.to_string(),
                channels: HashMap::new(),
            },
        );
    }

    pub fn remove_guild(&self, guild_id: GuildId) {
        self.lock().guilds.remove(&guild_id);
    }

    /// Registers a channel and the bot's permissions in it. The guild is
    /// created with a placeholder name when it was never added.
    pub fn add_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        permissions: ChannelPermissions,
    ) {
        let mut state = self.lock();
        state
            .guilds
            .entry(guild_id)
            .or_insert_with(|| GuildEntry {
                name: format!("guild-{guild_id}"),
                channels: HashMap::new(),
            })
            .channels
            .insert(channel_id, permissions);
    }

    // ── Behavior injection ───────────────────────────────────────────

    pub fn restrict_member(&self, guild_id: GuildId, user_id: UserId) {
        self.lock().restricted.insert((guild_id, user_id));
    }

    /// Makes every `is_member_restricted` call for the guild fail.
    pub fn fail_restriction_checks(&self, guild_id: GuildId) {
        self.lock().restriction_errors.insert(guild_id);
    }

    pub fn fail_sink_creation(&self, channel_id: ChannelId) {
        self.lock().failing_sink_channels.insert(channel_id);
    }

    pub fn fail_sends_to(&self, channel_id: ChannelId) {
        self.lock().failing_channels.insert(channel_id);
    }

    /// Delays every send into the channel, for timeout tests.
    pub fn delay_sends_to(&self, channel_id: ChannelId, delay: Duration) {
        self.lock().slow_channels.insert(channel_id, delay);
    }

    pub fn fail_dms_to(&self, user_id: UserId) {
        self.lock().failing_dms.insert(user_id);
    }

    // ── Recorded interactions ────────────────────────────────────────

    #[must_use]
    pub fn sends(&self) -> Vec<SentMessage> {
        self.lock().sends.clone()
    }

    #[must_use]
    pub fn sends_to(&self, channel_id: ChannelId) -> Vec<SentMessage> {
        self.lock()
            .sends
            .iter()
            .filter(|s| s.channel_id == channel_id)
            .cloned()
            .collect()
    }

    /// How many times a sink was requested, creations and reuses alike.
    #[must_use]
    pub fn sink_requests(&self) -> u64 {
        self.lock().sink_requests
    }

    #[must_use]
    pub fn sinks_created(&self) -> usize {
        self.lock().sinks.len()
    }

    #[must_use]
    pub fn deleted(&self) -> Vec<(ChannelId, MessageId)> {
        self.lock().deleted.clone()
    }

    #[must_use]
    pub fn ack_for(&self, message_id: MessageId) -> Option<RelayAck> {
        self.lock()
            .acks
            .iter()
            .rev()
            .find(|(_, id, _)| *id == message_id)
            .map(|(_, _, ack)| *ack)
    }

    #[must_use]
    pub fn notices_to(&self, channel_id: ChannelId) -> Vec<String> {
        self.lock()
            .notices
            .iter()
            .filter(|(c, _)| *c == channel_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    #[must_use]
    pub fn dms_to(&self, user_id: UserId) -> Vec<String> {
        self.lock()
            .dms
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuildDirectory for InMemoryPlatform {
    async fn guild_ids(&self) -> Vec<GuildId> {
        self.lock().guilds.keys().copied().collect()
    }

    async fn guild_name(&self, guild_id: GuildId) -> Option<String> {
        self.lock().guilds.get(&guild_id).map(|g| g.name.clone())
    }

    async fn channel_permissions(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Option<ChannelPermissions> {
        self.lock()
            .guilds
            .get(&guild_id)?
            .channels
            .get(&channel_id)
            .copied()
    }

    async fn is_member_restricted(&self, guild_id: GuildId, user_id: UserId) -> Result<bool> {
        let state = self.lock();
        if state.restriction_errors.contains(&guild_id) {
            return Err(Error::transport(format!(
                "member lookup in guild {guild_id}"
            )));
        }
        Ok(state.restricted.contains(&(guild_id, user_id)))
    }
}

#[async_trait]
impl Outbound for InMemoryPlatform {
    async fn get_or_create_sink(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SinkId> {
        let mut state = self.lock();
        state.sink_requests += 1;
        let Some(guild) = state.guilds.get(&guild_id) else {
            return Err(Error::not_found(format!("guild {guild_id}")));
        };
        if !guild.channels.contains_key(&channel_id) {
            return Err(Error::not_found(format!("channel {channel_id}")));
        }
        if state.failing_sink_channels.contains(&channel_id) {
            return Err(Error::permission_denied(format!(
                "webhook creation in channel {channel_id}"
            )));
        }
        if let Some(&sink) = state.sinks.get(&(guild_id, channel_id)) {
            return Ok(sink);
        }
        state.next_sink += 1;
        let sink = state.next_sink;
        state.sinks.insert((guild_id, channel_id), sink);
        state.sink_targets.insert(sink, (guild_id, channel_id));
        Ok(sink)
    }

    async fn send(&self, sink: SinkId, message: OutboundMessage) -> Result<MessageId> {
        let (guild_id, channel_id, delay) = {
            let state = self.lock();
            let Some(&(guild_id, channel_id)) = state.sink_targets.get(&sink) else {
                return Err(Error::not_found(format!("sink {sink}")));
            };
            let delay = state.slow_channels.get(&channel_id).copied();
            (guild_id, channel_id, delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        if state.failing_channels.contains(&channel_id) {
            return Err(Error::transport(format!("send to channel {channel_id}")));
        }
        state.next_message += 1;
        let message_id = state.next_message;
        state.sends.push(SentMessage {
            sink,
            guild_id,
            channel_id,
            message_id,
            message,
        });
        Ok(message_id)
    }
}

#[async_trait]
impl MessageOps for InMemoryPlatform {
    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        self.lock().deleted.push((channel_id, message_id));
        Ok(())
    }

    async fn mark_origin(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        ack: RelayAck,
    ) -> Result<()> {
        self.lock().acks.push((channel_id, message_id, ack));
        Ok(())
    }

    async fn post_notice(&self, channel_id: ChannelId, text: &str) -> Result<MessageId> {
        let mut state = self.lock();
        if state.failing_channels.contains(&channel_id) {
            return Err(Error::transport(format!("notice to channel {channel_id}")));
        }
        state.next_message += 1;
        let message_id = state.next_message;
        state.notices.push((channel_id, text.to_string()));
        Ok(message_id)
    }

    async fn send_dm(&self, user_id: UserId, text: &str) -> Result<()> {
        let mut state = self.lock();
        if state.failing_dms.contains(&user_id) {
            return Err(Error::transport(format!("dm to user {user_id}")));
        }
        state.dms.push((user_id, text.to_string()));
        Ok(())
    }
}
