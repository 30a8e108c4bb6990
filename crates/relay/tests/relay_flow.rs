//! Integration tests for the guildlink-relay crate.
//!
//! Each test wires a real engine over the in-memory platform and
//! stores, enrolls a few guilds through the module manager, and drives
//! inbound messages end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};

use {
    guildlink_common::{ChannelId, GuildId, MessageId, RelayId, RelayKind, UserId},
    guildlink_modules::ModuleManager,
    guildlink_platform::{
        Author, ChannelPermissions, InMemoryPlatform, InboundMessage, RelayAck, ReplyTarget,
    },
    guildlink_relay::{
        EngineConfig, EngineStores, Error, RejectReason, RelayEngine, RelayModule, RelayOutcome,
    },
    guildlink_store::{
        EntityKind, MemoryModuleConfigs, MemoryRelayLog, MemorySanctions, MemoryWelcomeLedger,
        ModuleConfigStore as _, RelayLogStore as _, RelayStatus, SanctionKind, WelcomeLedger as _,
    },
};

// ── Harness ──────────────────────────────────────────────────────────

struct Harness {
    platform: Arc<InMemoryPlatform>,
    manager: Arc<ModuleManager>,
    configs: Arc<MemoryModuleConfigs>,
    log: Arc<MemoryRelayLog>,
    sanctions: Arc<MemorySanctions>,
    welcomes: Arc<MemoryWelcomeLedger>,
    engine: RelayEngine,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let platform = Arc::new(InMemoryPlatform::new());
        let configs = Arc::new(MemoryModuleConfigs::new());
        let manager = Arc::new(ModuleManager::new(configs.clone(), platform.clone()));
        RelayModule::register_all(&manager);
        let log = Arc::new(MemoryRelayLog::new());
        let sanctions = Arc::new(MemorySanctions::new());
        let welcomes = Arc::new(MemoryWelcomeLedger::new());
        let engine = RelayEngine::new(
            platform.clone(),
            Arc::clone(&manager),
            EngineStores {
                log: log.clone(),
                sanctions: sanctions.clone(),
                welcomes: welcomes.clone(),
            },
            config,
        );
        Self {
            platform,
            manager,
            configs,
            log,
            sanctions,
            welcomes,
            engine,
        }
    }

    /// Enrolls a guild in a relay kind with default display settings.
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId, kind: RelayKind) {
        self.join_with(guild_id, channel_id, kind, json!({})).await;
    }

    async fn join_with(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        kind: RelayKind,
        overrides: Value,
    ) {
        self.platform
            .add_channel(guild_id, channel_id, ChannelPermissions::full());
        let mut config = json!({ "channel_id": channel_id });
        if let Value::Object(extra) = overrides {
            for (key, value) in extra {
                config[key.as_str()] = value;
            }
        }
        self.manager
            .save_config(guild_id, kind.module_id(), &config)
            .await
            .unwrap();
    }
}

fn message(
    guild_id: GuildId,
    channel_id: ChannelId,
    message_id: MessageId,
    author_id: UserId,
    content: &str,
) -> InboundMessage {
    InboundMessage {
        guild_id,
        channel_id,
        message_id,
        author: Author {
            id: author_id,
            display_name: "Alice".into(),
            avatar_url: Some("https://cdn.example/alice.png".into()),
            is_bot: false,
        },
        content: content.into(),
        attachments: Vec::new(),
        embeds: Vec::new(),
        reply_to: None,
    }
}

fn relay_id(outcome: &RelayOutcome) -> RelayId {
    match outcome {
        RelayOutcome::Relayed { id, .. } => *id,
        other => panic!("expected a relayed outcome, got {other:?}"),
    }
}

// ── Fan-out and rendering ────────────────────────────────────────────

#[tokio::test]
async fn every_other_guild_gets_exactly_one_copy() {
    let h = Harness::new();
    h.platform.add_guild(1, "Alpha");
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "hello out there"))
        .await;

    let id = relay_id(&outcome);
    assert_eq!(
        outcome,
        RelayOutcome::Relayed {
            id,
            delivered: 2,
            attempted: 2
        }
    );
    assert!(h.platform.sends_to(10).is_empty());
    assert_eq!(h.platform.sends_to(20).len(), 1);
    assert_eq!(h.platform.sends_to(30).len(), 1);

    let record = h.log.get_relay_record(id).await.unwrap().unwrap();
    assert_eq!(record.author_id, 7);
    assert_eq!(record.content, "hello out there");
    assert_eq!(record.kind, RelayKind::English);

    let deliveries = h.log.deliveries(id).await.unwrap();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries.iter().any(|d| d.guild_id == 2));
    assert!(deliveries.iter().any(|d| d.guild_id == 3));
    assert_eq!(h.platform.ack_for(100), Some(RelayAck::Delivered));
}

#[tokio::test]
async fn origin_name_shows_only_where_the_destination_wants_it() {
    let h = Harness::new();
    h.platform.add_guild(1, "Alpha");
    h.join(1, 10, RelayKind::English).await;
    h.join_with(2, 20, RelayKind::English, json!({ "show_origin_name": true }))
        .await;
    h.join_with(3, 30, RelayKind::English, json!({ "show_origin_name": false }))
        .await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "hello"))
        .await;

    let shown = &h.platform.sends_to(20)[0].message;
    assert_eq!(shown.display_name, "Alice (Alpha)");
    let hidden = &h.platform.sends_to(30)[0].message;
    assert_eq!(hidden.display_name, "Alpha");
}

#[tokio::test]
async fn avatar_and_mention_prefs_apply_per_destination() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join_with(2, 20, RelayKind::English, json!({ "show_avatar": false }))
        .await;
    h.join_with(3, 30, RelayKind::English, json!({ "allow_mentions": true }))
        .await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "hey @everyone"))
        .await;

    let plain = &h.platform.sends_to(20)[0].message;
    assert_eq!(plain.avatar_url, None);
    assert!(!plain.allow_mentions);
    let loud = &h.platform.sends_to(30)[0].message;
    assert!(loud.avatar_url.is_some());
    assert!(loud.allow_mentions);
}

#[tokio::test]
async fn kinds_never_cross() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::French).await;
    h.join(3, 30, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "english only"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert!(h.platform.sends_to(20).is_empty());
    assert_eq!(h.platform.sends_to(30).len(), 1);
}

#[tokio::test]
async fn sinks_are_created_once_per_channel() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "first"))
        .await;
    h.engine
        .handle_message(&message(1, 10, 101, 8, "second"))
        .await;

    assert_eq!(h.platform.sinks_created(), 2);
    assert_eq!(h.platform.sink_requests(), 4);
}

#[tokio::test]
async fn a_lone_guild_relays_into_the_void() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "anyone?"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 0,
            attempted: 0,
            ..
        }
    ));
    assert_eq!(h.platform.ack_for(100), Some(RelayAck::Delivered));
    assert!(
        h.log
            .get_relay_record_by_origin(100)
            .await
            .unwrap()
            .is_some()
    );
}

// ── Gating ───────────────────────────────────────────────────────────

#[tokio::test]
async fn messages_outside_relay_channels_are_ignored() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.platform.add_channel(1, 99, ChannelPermissions::full());

    let outcome = h
        .engine
        .handle_message(&message(1, 99, 100, 7, "offtopic"))
        .await;

    assert_eq!(outcome, RelayOutcome::Ignored);
    assert!(h.platform.sends().is_empty());
}

#[tokio::test]
async fn bot_and_empty_messages_are_ignored() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    let mut from_bot = message(1, 10, 100, 7, "beep");
    from_bot.author.is_bot = true;
    assert_eq!(
        h.engine.handle_message(&from_bot).await,
        RelayOutcome::Ignored
    );

    let empty = message(1, 10, 101, 7, "   ");
    assert_eq!(h.engine.handle_message(&empty).await, RelayOutcome::Ignored);
    assert!(h.platform.sends().is_empty());
}

#[tokio::test]
async fn rapid_second_send_is_rejected() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "first"))
        .await;
    let second = h
        .engine
        .handle_message(&message(1, 10, 101, 7, "second"))
        .await;

    assert_eq!(second, RelayOutcome::Rejected(RejectReason::Cooldown));
    assert_eq!(h.platform.sends_to(20).len(), 1);
    assert_eq!(h.platform.ack_for(101), Some(RelayAck::Rejected));
}

#[tokio::test]
async fn privileged_senders_skip_the_cooldown() {
    let mut config = EngineConfig::default();
    config.privileged_senders.insert(7);
    let h = Harness::with_config(config);
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "first"))
        .await;
    let second = h
        .engine
        .handle_message(&message(1, 10, 101, 7, "second"))
        .await;

    assert!(matches!(second, RelayOutcome::Relayed { .. }));
    assert_eq!(h.platform.sends_to(20).len(), 2);
    let record = h
        .log
        .get_relay_record_by_origin(100)
        .await
        .unwrap()
        .unwrap();
    assert!(record.privileged);
}

#[tokio::test]
async fn sanctioned_authors_are_rejected_for_every_kind() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(1, 11, RelayKind::French).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(2, 21, RelayKind::French).await;
    h.sanctions
        .sanction(EntityKind::User, 7, SanctionKind::RelayBlacklist);

    let english = h.engine.handle_message(&message(1, 10, 100, 7, "one")).await;
    let french = h
        .engine
        .handle_message(&message(1, 11, 101, 7, "deux"))
        .await;

    assert_eq!(english, RelayOutcome::Rejected(RejectReason::Sanctioned));
    assert_eq!(french, RelayOutcome::Rejected(RejectReason::Sanctioned));
    assert!(h.platform.sends().is_empty());
    assert!(
        h.log
            .get_relay_record_by_origin(100)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(h.platform.ack_for(100), Some(RelayAck::Rejected));
}

#[tokio::test]
async fn sanction_store_outage_fails_open() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.sanctions.set_failing(true);

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "still here"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed { delivered: 1, .. }
    ));
}

#[tokio::test]
async fn invite_links_are_deleted_not_relayed() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "join us discord.gg/abc123"))
        .await;

    assert_eq!(outcome, RelayOutcome::Rejected(RejectReason::BannedContent));
    assert!(h.platform.sends().is_empty());
    assert!(h.platform.deleted().contains(&(10, 100)));
    assert!(
        h.log
            .get_relay_record_by_origin(100)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(h.platform.ack_for(100), None);
}

// ── Delivery faults ──────────────────────────────────────────────────

#[tokio::test]
async fn destinations_without_usable_permissions_are_skipped() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;
    h.platform.add_channel(
        3,
        30,
        ChannelPermissions {
            can_send: false,
            ..ChannelPermissions::full()
        },
    );

    let outcome = h.engine.handle_message(&message(1, 10, 100, 7, "hi")).await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert!(h.platform.sends_to(30).is_empty());
}

#[tokio::test]
async fn majority_delivery_still_acknowledges() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;
    h.platform.fail_sends_to(30);

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "hello"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 2,
            ..
        }
    ));
    assert_eq!(h.platform.ack_for(100), Some(RelayAck::Delivered));
}

#[tokio::test]
async fn total_delivery_failure_marks_the_origin_failed() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.platform.fail_sends_to(20);

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "hello"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 0,
            attempted: 1,
            ..
        }
    ));
    assert_eq!(h.platform.ack_for(100), Some(RelayAck::Failed));
}

#[tokio::test]
async fn a_slow_destination_times_out_without_blocking_the_rest() {
    let mut config = EngineConfig::default();
    config.send_timeout_ms = 50;
    let h = Harness::with_config(config);
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;
    h.platform.delay_sends_to(30, Duration::from_millis(500));

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "hurry"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 2,
            ..
        }
    ));
    assert_eq!(h.platform.sends_to(20).len(), 1);
    assert!(h.platform.sends_to(30).is_empty());
}

#[tokio::test]
async fn sink_failure_counts_as_a_failed_destination() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;
    h.platform.fail_sink_creation(30);

    let outcome = h.engine.handle_message(&message(1, 10, 100, 7, "hi")).await;

    let id = relay_id(&outcome);
    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 2,
            ..
        }
    ));
    let deliveries = h.log.deliveries(id).await.unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].guild_id, 2);
}

#[tokio::test]
async fn restricted_members_are_skipped_quietly() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;
    h.platform.restrict_member(3, 7);

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "partial reach"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert!(h.platform.sends_to(30).is_empty());
}

#[tokio::test]
async fn privileged_senders_reach_restricted_guilds() {
    let mut config = EngineConfig::default();
    config.privileged_senders.insert(7);
    let h = Harness::with_config(config);
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.platform.restrict_member(2, 7);

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "mod notice"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert_eq!(h.platform.sends_to(20).len(), 1);
}

#[tokio::test]
async fn restriction_check_outage_does_not_drop_the_destination() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.platform.fail_restriction_checks(2);

    let outcome = h.engine.handle_message(&message(1, 10, 100, 7, "hi")).await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
}

// ── Replies ──────────────────────────────────────────────────────────

#[tokio::test]
async fn replies_point_at_the_destination_local_copy() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "original"))
        .await;
    let copy_in_2 = h.platform.sends_to(20)[0].message_id;

    let mut reply = message(1, 10, 101, 8, "what a thought");
    reply.reply_to = Some(100);
    h.engine.handle_message(&reply).await;

    let delivered = h.platform.sends_to(20);
    assert_eq!(delivered.len(), 2);
    assert_eq!(
        delivered[1].message.reply,
        Some(ReplyTarget::Local {
            channel_id: 20,
            message_id: copy_in_2
        })
    );
}

#[tokio::test]
async fn late_joiners_get_an_origin_link_for_replies() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "early days"))
        .await;
    h.join(3, 30, RelayKind::English).await;

    let mut reply = message(1, 10, 101, 8, "remember this?");
    reply.reply_to = Some(100);
    h.engine.handle_message(&reply).await;

    let delivered = &h.platform.sends_to(30)[0].message;
    match &delivered.reply {
        Some(ReplyTarget::Link { url }) => {
            assert!(url.ends_with("/1/10/100"), "unexpected url {url}");
        },
        other => panic!("expected a link fallback, got {other:?}"),
    }
}

#[tokio::test]
async fn replies_to_unrelayed_messages_carry_no_target() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    let mut reply = message(1, 10, 101, 7, "re: something local");
    reply.reply_to = Some(55);
    h.engine.handle_message(&reply).await;

    assert_eq!(h.platform.sends_to(20)[0].message.reply, None);
}

// ── Moderation ───────────────────────────────────────────────────────

#[tokio::test]
async fn takedown_removes_every_copy_and_soft_deletes() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "offending"))
        .await;
    let id = relay_id(&outcome);

    let report = h.engine.takedown(&id.to_string()).await.unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(report.record.status, RelayStatus::Deleted);
    assert!(h.platform.deleted().contains(&(10, 100)));

    let record = h.log.get_relay_record(id).await.unwrap().unwrap();
    assert_eq!(record.status, RelayStatus::Deleted);
}

#[tokio::test]
async fn takedown_of_an_unknown_id_is_a_not_found_error() {
    let h = Harness::new();

    let err = h.engine.takedown("ZZZZ-9999").await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn origin_deletion_takes_the_copies_down() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "now you see me"))
        .await;
    let copy = h.platform.sends_to(20)[0].message_id;

    h.engine.handle_message_deleted(100).await.unwrap();

    assert!(h.platform.deleted().contains(&(20, copy)));
    let record = h
        .log
        .get_relay_record_by_origin(100)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RelayStatus::Deleted);

    // A second event for the same origin must not touch the copies again.
    h.engine.handle_message_deleted(100).await.unwrap();
    assert_eq!(h.platform.deleted().len(), 1);
}

#[tokio::test]
async fn deleting_an_unrelayed_message_is_a_no_op() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;

    h.engine.handle_message_deleted(424_242).await.unwrap();

    assert!(h.platform.deleted().is_empty());
}

#[tokio::test]
async fn reports_reach_the_report_channel() {
    let mut config = EngineConfig::default();
    config.report_channel = Some(666);
    let h = Harness::with_config(config);
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "suspicious"))
        .await;
    let id = relay_id(&outcome);

    let record = h.engine.report(&id.compact(), 42).await.unwrap();
    assert_eq!(record.id, id);
    let notices = h.platform.notices_to(666);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("42"));

    let err = h.engine.report("12345", 42).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn relays_are_logged_to_the_staff_channel() {
    let mut config = EngineConfig::default();
    config.staff_channels.insert(RelayKind::English, 555);
    let h = Harness::with_config(config);
    h.platform.add_guild(1, "Alpha");
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "ping @everyone"))
        .await;
    let id = relay_id(&outcome);

    let notices = h.platform.notices_to(555);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains(&id.to_string()));
    assert!(notices[0].contains("Alice"));
    assert!(notices[0].contains("[1/1 delivered]"));
    assert!(!notices[0].contains("@everyone"));
}

#[tokio::test]
async fn first_relay_sends_one_welcome_dm() {
    let mut config = EngineConfig::default();
    config.cooldown_secs = 0;
    let h = Harness::with_config(config);
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    h.engine
        .handle_message(&message(1, 10, 100, 7, "first"))
        .await;
    h.engine
        .handle_message(&message(1, 10, 101, 7, "second"))
        .await;

    assert_eq!(h.platform.dms_to(7).len(), 1);
}

#[tokio::test]
async fn welcome_mark_survives_a_failed_dm() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.platform.fail_dms_to(7);

    h.engine
        .handle_message(&message(1, 10, 100, 7, "first"))
        .await;

    assert!(h.welcomes.was_welcomed(7, RelayKind::English).await.unwrap());
    assert!(h.platform.dms_to(7).is_empty());
}

// ── Lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn leaving_the_relay_removes_the_guild_from_the_topology() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;

    h.manager
        .delete_config(2, RelayKind::English.module_id())
        .await
        .unwrap();

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "smaller world"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert!(h.platform.sends_to(20).is_empty());
}

#[tokio::test]
async fn a_kicked_guild_drops_out_of_the_topology() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;
    h.join(3, 30, RelayKind::English).await;

    // The bot is removed from guild 2; its saved config stays behind.
    h.platform.remove_guild(2);

    let outcome = h
        .engine
        .handle_message(&message(1, 10, 100, 7, "who is left"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert!(h.platform.sends_to(20).is_empty());
    assert!(
        h.configs
            .get_module_config(2, RelayKind::English.module_id())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn saved_configs_survive_a_restart() {
    let h = Harness::new();
    h.join(1, 10, RelayKind::English).await;
    h.join(2, 20, RelayKind::English).await;

    // A fresh process: a new manager and engine over the same stores.
    let manager = Arc::new(ModuleManager::new(h.configs.clone(), h.platform.clone()));
    RelayModule::register_all(&manager);
    manager.load_all().await;
    let engine = RelayEngine::new(
        h.platform.clone(),
        manager,
        EngineStores {
            log: h.log.clone(),
            sanctions: h.sanctions.clone(),
            welcomes: h.welcomes.clone(),
        },
        EngineConfig::default(),
    );

    let outcome = engine
        .handle_message(&message(1, 10, 100, 7, "back online"))
        .await;

    assert!(matches!(
        outcome,
        RelayOutcome::Relayed {
            delivered: 1,
            attempted: 1,
            ..
        }
    ));
    assert_eq!(h.platform.sends_to(20).len(), 1);
}

#[tokio::test]
async fn joining_with_an_unusable_channel_is_rejected() {
    let h = Harness::new();
    h.platform.add_channel(
        1,
        10,
        ChannelPermissions {
            can_manage_sinks: false,
            ..ChannelPermissions::full()
        },
    );

    let err = h
        .manager
        .save_config(1, RelayKind::English.module_id(), &json!({ "channel_id": 10 }))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        guildlink_modules::Error::InvalidConfig { .. }
    ));
    assert!(
        h.manager
            .instance(1, RelayKind::English.module_id())
            .is_none()
    );
}
