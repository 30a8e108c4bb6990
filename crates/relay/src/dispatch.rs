use std::{sync::Arc, time::Duration};

use {
    futures::{StreamExt, stream},
    tracing::{debug, warn},
};

use {
    guildlink_platform::{InboundMessage, Platform, ReplyTarget, message_url},
    guildlink_store::{RelayDelivery, RelayLogStore, RelayRecord},
};

use crate::{render, topology::Destination};

/// Aggregate result of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanoutReport {
    /// Destinations a delivery was actually attempted to. Skips for
    /// restricted members are not attempts.
    pub attempted: usize,
    pub delivered: usize,
}

impl FanoutReport {
    /// Delivered to at least half of what was attempted. An empty
    /// topology still acknowledges: nothing to fan out is not a
    /// failure.
    #[must_use]
    pub fn acknowledged(&self) -> bool {
        self.attempted == 0 || self.delivered * 2 >= self.attempted
    }
}

enum DeliveryOutcome {
    Delivered,
    Failed,
    Skipped,
}

/// Delivers one recorded message to every destination with bounded
/// concurrency. One destination failing, hanging, or rejecting never
/// stops the rest.
pub struct Dispatcher {
    platform: Arc<dyn Platform>,
    log: Arc<dyn RelayLogStore>,
    concurrency: usize,
    send_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        log: Arc<dyn RelayLogStore>,
        concurrency: usize,
        send_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            log,
            concurrency,
            send_timeout,
        }
    }

    pub async fn fan_out(
        &self,
        record: &RelayRecord,
        message: &InboundMessage,
        origin_guild_name: &str,
        privileged: bool,
        destinations: Vec<Destination>,
    ) -> FanoutReport {
        let outcomes: Vec<DeliveryOutcome> =
            stream::iter(destinations.into_iter().map(|destination| {
                self.deliver(record, message, origin_guild_name, privileged, destination)
            }))
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut report = FanoutReport::default();
        for outcome in outcomes {
            match outcome {
                DeliveryOutcome::Delivered => {
                    report.attempted += 1;
                    report.delivered += 1;
                },
                DeliveryOutcome::Failed => report.attempted += 1,
                DeliveryOutcome::Skipped => {},
            }
        }
        report
    }

    async fn deliver(
        &self,
        record: &RelayRecord,
        message: &InboundMessage,
        origin_guild_name: &str,
        privileged: bool,
        destination: Destination,
    ) -> DeliveryOutcome {
        if !privileged {
            match self
                .platform
                .is_member_restricted(destination.guild_id, message.author.id)
                .await
            {
                Ok(true) => {
                    debug!(
                        relay_id = %record.id,
                        guild_id = destination.guild_id,
                        "author restricted in destination, skipping"
                    );
                    return DeliveryOutcome::Skipped;
                },
                Ok(false) => {},
                Err(error) => {
                    debug!(
                        relay_id = %record.id,
                        guild_id = destination.guild_id,
                        %error,
                        "restriction lookup failed, delivering anyway"
                    );
                },
            }
        }

        let reply = self.reply_target_for(message, &destination).await;
        let rendered =
            render::render_for_destination(message, origin_guild_name, &destination, reply);

        let sink = match self
            .platform
            .get_or_create_sink(destination.guild_id, destination.channel_id)
            .await
        {
            Ok(sink) => sink,
            Err(error) => {
                warn!(
                    relay_id = %record.id,
                    guild_id = destination.guild_id,
                    channel_id = destination.channel_id,
                    %error,
                    "sink unavailable"
                );
                return DeliveryOutcome::Failed;
            },
        };

        let sent = tokio::time::timeout(self.send_timeout, self.platform.send(sink, rendered)).await;
        let delivered_message_id = match sent {
            Ok(Ok(message_id)) => message_id,
            Ok(Err(error)) => {
                warn!(
                    relay_id = %record.id,
                    guild_id = destination.guild_id,
                    %error,
                    "delivery failed"
                );
                return DeliveryOutcome::Failed;
            },
            Err(_) => {
                warn!(
                    relay_id = %record.id,
                    guild_id = destination.guild_id,
                    timeout = ?self.send_timeout,
                    "delivery timed out"
                );
                return DeliveryOutcome::Failed;
            },
        };

        let delivery = RelayDelivery {
            relay_id: record.id,
            guild_id: destination.guild_id,
            channel_id: destination.channel_id,
            message_id: delivered_message_id,
        };
        if let Err(error) = self.log.add_delivery(&delivery).await {
            warn!(
                relay_id = %record.id,
                guild_id = destination.guild_id,
                %error,
                "delivered, but the delivery record failed to persist"
            );
        }
        DeliveryOutcome::Delivered
    }

    /// Rewrites a reply to point at the destination-local copy of the
    /// referenced message, falling back to a link to the origin when no
    /// copy was delivered there.
    async fn reply_target_for(
        &self,
        message: &InboundMessage,
        destination: &Destination,
    ) -> Option<ReplyTarget> {
        let replied_to = message.reply_to?;
        let record = match self.log.get_relay_record_by_origin(replied_to).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(error) => {
                debug!(origin_message_id = replied_to, %error, "reply lookup failed");
                return None;
            },
        };
        let deliveries = match self.log.deliveries(record.id).await {
            Ok(deliveries) => deliveries,
            Err(error) => {
                debug!(relay_id = %record.id, %error, "delivery list lookup failed");
                return None;
            },
        };
        let local = deliveries
            .iter()
            .find(|delivery| delivery.guild_id == destination.guild_id);
        Some(match local {
            Some(delivery) => ReplyTarget::Local {
                channel_id: delivery.channel_id,
                message_id: delivery.message_id,
            },
            None => ReplyTarget::Link {
                url: message_url(
                    record.origin_guild_id,
                    record.origin_channel_id,
                    record.origin_message_id,
                ),
            },
        })
    }
}
