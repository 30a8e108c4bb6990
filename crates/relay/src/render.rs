//! Per-destination rendering of one origin message.

use guildlink_platform::{InboundMessage, OutboundMessage, ReplyTarget};

use crate::topology::Destination;

/// Display-name budget imposed by the platform.
pub const MAX_NAME_LEN: usize = 80;
/// Most attachments the platform accepts on one message.
pub const MAX_ATTACHMENTS: usize = 10;
/// Most embeds the platform accepts on one message.
pub const MAX_EMBEDS: usize = 10;

/// Renders the origin message for one destination. The destination's
/// own display preferences apply, not the origin's: each guild controls
/// what it exposes to its own members.
#[must_use]
pub fn render_for_destination(
    message: &InboundMessage,
    origin_guild_name: &str,
    destination: &Destination,
    reply: Option<ReplyTarget>,
) -> OutboundMessage {
    let display_name = if destination.show_origin_name {
        sender_name(&message.author.display_name, origin_guild_name)
    } else {
        truncate_name(origin_guild_name.to_string())
    };
    OutboundMessage {
        content: message.content.clone(),
        display_name,
        avatar_url: destination
            .show_avatar
            .then(|| message.author.avatar_url.clone())
            .flatten(),
        attachments: message
            .attachments
            .iter()
            .take(MAX_ATTACHMENTS)
            .cloned()
            .collect(),
        embeds: message.embeds.iter().take(MAX_EMBEDS).cloned().collect(),
        allow_mentions: destination.allow_mentions,
        reply,
    }
}

fn sender_name(author: &str, guild: &str) -> String {
    truncate_name(format!("{author} ({guild})"))
}

fn truncate_name(name: String) -> String {
    if name.chars().count() <= MAX_NAME_LEN {
        return name;
    }
    let mut truncated: String = name.chars().take(MAX_NAME_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}
