//! Narrow seam between the relay engine and the chat platform.
//!
//! The engine never talks to a REST or gateway client directly; everything
//! it needs is expressed by the traits in [`traits`]. [`memory`] provides a
//! recording fake so the whole pipeline runs in tests without a network.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use {
    error::{Error, Result},
    memory::InMemoryPlatform,
    traits::{GuildDirectory, MessageOps, Outbound, Platform},
    types::{
        AttachmentRef, Author, ChannelPermissions, InboundMessage, OutboundMessage, RelayAck,
        ReplyTarget, SinkId, message_url,
    },
};
