//! discord-platform: Discord session, cache and REST client
//!
//! # Modules
//!
//! - `client`: the injectable `Platform` trait and its `DiscordClient` implementation
//! - `gateway`: websocket login, heartbeats, readiness and reconnects
//! - `cache`: in-memory guilds, channels, threads and voice states
//! - `rest`: REST endpoints for channels, messages, guilds and members
//! - `permissions`: effective permission resolution for the bot
//! - `model`: serde wire types
//! - `config`: credential and endpoint configuration
//! - `error`: `PlatformError` and `Result` alias

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod permissions;
pub mod rest;

// Re-exports
pub use client::{DiscordClient, Platform};
pub use config::PlatformConfig;
pub use error::{PlatformError, Result};
pub use model::*;
pub use permissions::PermissionSummary;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{DiscordClient, Platform, PlatformConfig, PlatformError};
}
