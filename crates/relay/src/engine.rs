//! The relay engine: gates, records, fans out, and audits one inbound
//! message at a time.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use {
    guildlink_common::{MessageId, RelayId, UserId},
    guildlink_modules::ModuleManager,
    guildlink_platform::{InboundMessage, Platform, RelayAck},
    guildlink_store::{
        EntityKind, RelayLogStore, RelayRecord, RelayStatus, SanctionKind, SanctionStore,
        WelcomeLedger,
    },
};

use crate::{
    audit::AuditSink,
    config::EngineConfig,
    dispatch::Dispatcher,
    error::{Error, Result},
    gate::{CooldownGate, contains_invite_link},
    identity::IdentityService,
    topology::TopologyResolver,
};

/// The persistent stores the engine consumes, bundled for construction.
pub struct EngineStores {
    pub log: Arc<dyn RelayLogStore>,
    pub sanctions: Arc<dyn SanctionStore>,
    pub welcomes: Arc<dyn WelcomeLedger>,
}

/// Why a message was turned away before fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Sanctioned,
    Cooldown,
    BannedContent,
}

/// What the engine did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The message was not addressed to a relay channel, or carried
    /// nothing to relay.
    Ignored,
    Rejected(RejectReason),
    /// The origin record could not be persisted; nothing was sent.
    Aborted,
    Relayed {
        id: RelayId,
        delivered: usize,
        attempted: usize,
    },
}

/// Result of a moderation takedown.
#[derive(Debug, Clone, PartialEq)]
pub struct TakedownReport {
    pub record: RelayRecord,
    /// Delivered copies removed from destination guilds.
    pub removed: usize,
}

/// Orchestrates the full pipeline: gate, record, resolve, fan out,
/// mark, audit. One instance serves every guild and relay kind.
pub struct RelayEngine {
    platform: Arc<dyn Platform>,
    log: Arc<dyn RelayLogStore>,
    sanctions: Arc<dyn SanctionStore>,
    identity: IdentityService,
    topology: TopologyResolver,
    dispatcher: Dispatcher,
    audit: AuditSink,
    cooldowns: CooldownGate,
    config: EngineConfig,
}

impl RelayEngine {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        modules: Arc<ModuleManager>,
        stores: EngineStores,
        config: EngineConfig,
    ) -> Self {
        let identity = IdentityService::new(Arc::clone(&stores.log));
        let topology = TopologyResolver::new(modules, Arc::clone(&platform));
        let dispatcher = Dispatcher::new(
            Arc::clone(&platform),
            Arc::clone(&stores.log),
            config.fanout_concurrency,
            config.send_timeout(),
        );
        let audit = AuditSink::new(
            Arc::clone(&platform),
            Arc::clone(&stores.welcomes),
            config.staff_channels.clone(),
            config.report_channel,
        );
        let cooldowns = CooldownGate::new(config.cooldown());
        Self {
            identity,
            topology,
            dispatcher,
            audit,
            cooldowns,
            log: stores.log,
            sanctions: stores.sanctions,
            platform,
            config,
        }
    }

    /// Reacts to one inbound message. Gate rejections and fan-out
    /// failures are reported as outcomes, never as errors, so one bad
    /// message can never take the event loop down.
    pub async fn handle_message(&self, message: &InboundMessage) -> RelayOutcome {
        if message.author.is_bot || message.is_empty() {
            return RelayOutcome::Ignored;
        }
        let Some(kind) = self
            .topology
            .kind_for_channel(message.guild_id, message.channel_id)
        else {
            return RelayOutcome::Ignored;
        };

        let author_id = message.author.id;
        let privileged = self.config.is_privileged(author_id);

        // Sanctions trump everything, privilege included.
        match self
            .sanctions
            .has_active_sanction(EntityKind::User, author_id, SanctionKind::RelayBlacklist)
            .await
        {
            Ok(true) => {
                debug!(author_id, kind = kind.as_str(), "sanctioned author rejected");
                self.mark(message, RelayAck::Rejected).await;
                return RelayOutcome::Rejected(RejectReason::Sanctioned);
            },
            Ok(false) => {},
            Err(error) => {
                warn!(author_id, %error, "sanction lookup failed, relaying anyway");
            },
        }

        if contains_invite_link(&message.content) {
            if let Err(error) = self
                .platform
                .delete_message(message.channel_id, message.message_id)
                .await
            {
                warn!(
                    message_id = message.message_id,
                    %error,
                    "could not delete the invite message"
                );
            }
            info!(author_id, kind = kind.as_str(), "invite link dropped");
            return RelayOutcome::Rejected(RejectReason::BannedContent);
        }

        if !privileged && !self.cooldowns.check(author_id).allowed() {
            self.mark(message, RelayAck::Rejected).await;
            return RelayOutcome::Rejected(RejectReason::Cooldown);
        }

        let record = match self.identity.record_origin(kind, message, privileged).await {
            Ok(record) => record,
            Err(error) => {
                error!(
                    author_id,
                    kind = kind.as_str(),
                    %error,
                    "could not persist the relay record, aborting"
                );
                self.mark(message, RelayAck::Failed).await;
                return RelayOutcome::Aborted;
            },
        };

        let origin_guild_name = self
            .platform
            .guild_name(message.guild_id)
            .await
            .unwrap_or_else(|| message.guild_id.to_string());
        let destinations = self
            .topology
            .resolve_destinations(message.guild_id, kind)
            .await;
        let report = self
            .dispatcher
            .fan_out(&record, message, &origin_guild_name, privileged, destinations)
            .await;

        let ack = if report.acknowledged() {
            RelayAck::Delivered
        } else {
            RelayAck::Failed
        };
        self.mark(message, ack).await;
        self.audit.log_relay(&record, report).await;
        self.audit.welcome_if_first(author_id, kind).await;

        info!(
            relay_id = %record.id,
            kind = kind.as_str(),
            author_id,
            delivered = report.delivered,
            attempted = report.attempted,
            "message relayed"
        );
        RelayOutcome::Relayed {
            id: record.id,
            delivered: report.delivered,
            attempted: report.attempted,
        }
    }

    /// Reacts to the origin message being deleted in its home guild:
    /// removes every delivered copy and soft-deletes the record.
    pub async fn handle_message_deleted(&self, origin_message_id: MessageId) -> Result<()> {
        let Some(record) = self
            .log
            .get_relay_record_by_origin(origin_message_id)
            .await?
        else {
            return Ok(());
        };
        if record.status == RelayStatus::Deleted {
            return Ok(());
        }
        let removed = self.remove_deliveries(&record).await;
        self.log.mark_deleted(record.id).await?;
        info!(relay_id = %record.id, removed, "origin deleted, copies taken down");
        Ok(())
    }

    /// Moderator takedown by opaque id or origin id: deletes every
    /// recorded delivered copy plus the origin, then soft-deletes the
    /// record.
    pub async fn takedown(&self, query: &str) -> Result<TakedownReport> {
        let Some(mut record) = self.identity.resolve(query).await? else {
            return Err(Error::not_found(format!("relay message {query}")));
        };
        let removed = self.remove_deliveries(&record).await;
        match self
            .platform
            .delete_message(record.origin_channel_id, record.origin_message_id)
            .await
        {
            Ok(()) | Err(guildlink_platform::Error::NotFound { .. }) => {},
            Err(error) => {
                warn!(relay_id = %record.id, %error, "could not delete the origin message");
            },
        }
        self.log.mark_deleted(record.id).await?;
        record.status = RelayStatus::Deleted;
        info!(relay_id = %record.id, removed, "relay message taken down");
        Ok(TakedownReport { record, removed })
    }

    /// User report by opaque id or origin id: posts a staff notice and
    /// returns the record.
    pub async fn report(&self, query: &str, reporter: UserId) -> Result<RelayRecord> {
        let Some(record) = self.identity.resolve(query).await? else {
            return Err(Error::not_found(format!("relay message {query}")));
        };
        self.audit.report_notice(&record, reporter).await;
        Ok(record)
    }

    /// Record lookup by opaque id or origin id.
    pub async fn lookup(&self, query: &str) -> Result<Option<RelayRecord>> {
        self.identity.resolve(query).await
    }

    /// Deletes every recorded delivered copy of a record. Copies that
    /// are already gone are fine; other failures are logged and
    /// skipped.
    async fn remove_deliveries(&self, record: &RelayRecord) -> usize {
        let deliveries = match self.log.deliveries(record.id).await {
            Ok(deliveries) => deliveries,
            Err(error) => {
                warn!(relay_id = %record.id, %error, "could not list deliveries");
                return 0;
            },
        };
        let mut removed = 0;
        for delivery in deliveries {
            match self
                .platform
                .delete_message(delivery.channel_id, delivery.message_id)
                .await
            {
                Ok(()) => removed += 1,
                Err(guildlink_platform::Error::NotFound { .. }) => {},
                Err(error) => {
                    warn!(
                        relay_id = %record.id,
                        guild_id = delivery.guild_id,
                        %error,
                        "could not delete a delivered copy"
                    );
                },
            }
        }
        removed
    }

    async fn mark(&self, message: &InboundMessage, ack: RelayAck) {
        if let Err(error) = self
            .platform
            .mark_origin(message.channel_id, message.message_id, ack)
            .await
        {
            debug!(message_id = message.message_id, %error, "origin marker failed");
        }
    }
}
