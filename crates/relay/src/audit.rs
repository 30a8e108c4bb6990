use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use {
    guildlink_common::{ChannelId, RelayKind, UserId},
    guildlink_platform::Platform,
    guildlink_store::{RelayRecord, WelcomeLedger},
};

use crate::dispatch::FanoutReport;

/// Inserts a zero-width space after every `@` so staff-facing text can
/// never ping anyone.
#[must_use]
pub fn neutralize_mentions(text: &str) -> String {
    text.replace('@', "@\u{200b}")
}

/// Staff-facing audit trail, user reports, and first-send welcomes.
///
/// Everything here is best-effort: a failure is logged locally and
/// never affects the relay outcome.
pub struct AuditSink {
    platform: Arc<dyn Platform>,
    welcomes: Arc<dyn WelcomeLedger>,
    staff_channels: HashMap<RelayKind, ChannelId>,
    report_channel: Option<ChannelId>,
}

impl AuditSink {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        welcomes: Arc<dyn WelcomeLedger>,
        staff_channels: HashMap<RelayKind, ChannelId>,
        report_channel: Option<ChannelId>,
    ) -> Self {
        Self {
            platform,
            welcomes,
            staff_channels,
            report_channel,
        }
    }

    /// Posts one mention-free line per relay attempt to the kind's
    /// staff channel, when one is configured.
    pub async fn log_relay(&self, record: &RelayRecord, report: FanoutReport) {
        let Some(&channel_id) = self.staff_channels.get(&record.kind) else {
            return;
        };
        let line = format!(
            "[{}] {} {} ({}) in guild {}: {} [{}/{} delivered]",
            record.kind.as_str(),
            record.id,
            neutralize_mentions(&record.author_name),
            record.author_id,
            record.origin_guild_id,
            neutralize_mentions(&record.content),
            report.delivered,
            report.attempted,
        );
        if let Err(error) = self.platform.post_notice(channel_id, &line).await {
            warn!(relay_id = %record.id, %error, "staff audit notice failed");
        }
    }

    /// Sends a one-time welcome DM on an author's first relay send per
    /// kind. The ledger mark is written before the DM goes out, so a
    /// failed DM is never retried.
    pub async fn welcome_if_first(&self, user_id: UserId, kind: RelayKind) {
        match self.welcomes.was_welcomed(user_id, kind).await {
            Ok(true) => return,
            Ok(false) => {},
            Err(error) => {
                debug!(user_id, kind = kind.as_str(), %error, "welcome ledger read failed");
                return;
            },
        }
        if let Err(error) = self.welcomes.mark_welcomed(user_id, kind).await {
            debug!(user_id, kind = kind.as_str(), %error, "welcome ledger write failed");
            return;
        }
        if let Err(error) = self.platform.send_dm(user_id, &welcome_text(kind)).await {
            debug!(user_id, kind = kind.as_str(), %error, "welcome dm failed");
        }
    }

    /// Posts a user report to the configured report channel.
    pub async fn report_notice(&self, record: &RelayRecord, reporter: UserId) {
        let Some(channel_id) = self.report_channel else {
            return;
        };
        let line = format!(
            "Report from user {} on relay message {} by {} ({}): {}",
            reporter,
            record.id,
            neutralize_mentions(&record.author_name),
            record.author_id,
            neutralize_mentions(&record.content),
        );
        if let Err(error) = self.platform.post_notice(channel_id, &line).await {
            warn!(relay_id = %record.id, %error, "report notice failed");
        }
    }
}

fn welcome_text(kind: RelayKind) -> String {
    format!(
        "Hi! Your message was just shared with every guild on the {} relay. \
         Messages from the other guilds appear in the same channel, and \
         staff of every participating guild can trace a shared message by \
         its relay id. The usual server rules apply everywhere it lands.",
        kind.as_str()
    )
}
