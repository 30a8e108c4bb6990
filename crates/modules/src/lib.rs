//! Guild module system.
//!
//! A module is a per-guild unit of functionality with a persisted JSON
//! config. The manager owns registration of module types, config
//! validation and persistence, and the live instance map.

pub mod error;
pub mod manager;
pub mod module;

pub use {
    error::{Error, Result},
    manager::ModuleManager,
    module::{GuildModule, ModuleDescriptor},
};
