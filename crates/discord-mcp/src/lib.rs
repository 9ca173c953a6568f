//! discord-mcp: MCP server for Discord
//!
//! Exposes a Discord bot session over the Model Context Protocol.
//!
//! Architecture:
//! stdin → MCP JSON-RPC → BridgeServer → Platform (Discord) → stdout
//!
//! Methods:
//! - initialize, ping → handshake
//! - tools/list → send_message, read_messages, list_channels
//! - tools/call → validated tool execution, gated on readiness
//! - resources/list → discord://guilds
//! - resources/read → cached guild summaries, gated on readiness

pub mod channel_types;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tool_registry;
pub mod tools;
pub mod transport;
pub mod validation;

// Re-export main types
pub use error::BridgeError;
pub use lifecycle::{Coordinator, Readiness};
pub use protocol::{JsonRpcError, McpRequest, McpResponse};
pub use server::{BridgeServer, ServerInfo};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{BridgeServer, Coordinator, McpRequest, McpResponse, Readiness, ServerInfo};
}
