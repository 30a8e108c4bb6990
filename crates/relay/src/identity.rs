use std::sync::Arc;

use {
    guildlink_common::{MessageId, RelayId, RelayKind, unix_now},
    guildlink_platform::InboundMessage,
    guildlink_store::{RelayLogStore, RelayRecord, RelayStatus},
};

use crate::error::Result;

/// Assigns opaque ids and owns the persisted relay record trail.
pub struct IdentityService {
    log: Arc<dyn RelayLogStore>,
}

impl IdentityService {
    #[must_use]
    pub fn new(log: Arc<dyn RelayLogStore>) -> Self {
        Self { log }
    }

    /// Persists the origin record before any fan-out, so a partially
    /// failed fan-out still leaves a resolvable trail.
    ///
    /// Ids are generated without a store uniqueness check; over a
    /// 36-symbol alphabet at eight characters the collision odds are
    /// negligible, and a clash surfaces as a store conflict.
    pub async fn record_origin(
        &self,
        kind: RelayKind,
        message: &InboundMessage,
        privileged: bool,
    ) -> Result<RelayRecord> {
        let record = RelayRecord {
            id: RelayId::generate(),
            kind,
            origin_guild_id: message.guild_id,
            origin_channel_id: message.channel_id,
            origin_message_id: message.message_id,
            author_id: message.author.id,
            author_name: message.author.display_name.clone(),
            content: message.content.clone(),
            privileged,
            status: RelayStatus::Active,
            created_at: unix_now(),
        };
        self.log.create_relay_record(&record).await?;
        Ok(record)
    }

    /// Looks a record up by opaque id first, then by the origin
    /// message's platform id. Returns `None` when neither matches.
    pub async fn resolve(&self, query: &str) -> Result<Option<RelayRecord>> {
        if let Ok(id) = RelayId::parse(query)
            && let Some(record) = self.log.get_relay_record(id).await?
        {
            return Ok(Some(record));
        }
        if let Ok(origin_message_id) = query.trim().parse::<MessageId>() {
            return Ok(self
                .log
                .get_relay_record_by_origin(origin_message_id)
                .await?);
        }
        Ok(None)
    }
}
