//! Cross-guild chat relay engine.
//!
//! Guilds opt into a shared relay kind by enabling its module with a
//! target channel; every message sent there is recorded under an
//! opaque id and fanned out to the matching channel of every other
//! participating guild. The engine also handles moderation: origin
//! deletion teardown, staff takedowns, and user reports.

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gate;
pub mod identity;
pub mod module;
pub mod render;
pub mod topology;

pub use {
    audit::AuditSink,
    config::{EngineConfig, RelayConfig},
    dispatch::{Dispatcher, FanoutReport},
    engine::{EngineStores, RejectReason, RelayEngine, RelayOutcome, TakedownReport},
    error::{Error, Result},
    gate::{CooldownDecision, CooldownGate, contains_invite_link},
    identity::IdentityService,
    module::RelayModule,
    topology::{Destination, TopologyResolver},
};
