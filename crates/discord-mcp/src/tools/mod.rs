//! Built-in Tools
//!
//! `send_message`, `read_messages` and `list_channels`, plus the helpers
//! they share for resolving Discord objects and rendering results.

pub mod list_channels;
pub mod read_messages;
pub mod send_message;

pub use list_channels::{ListChannelsRequest, ListChannelsTool, SortBy};
pub use read_messages::{ReadMessagesRequest, ReadMessagesTool, SortOrder};
pub use send_message::{SendMessageRequest, SendMessageTool};

use crate::error::BridgeError;
use crate::tool_registry::{BoxedTool, ToolRegistry};
use discord_platform::{Channel, Platform};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// The tools in `tools/list` order
pub fn builtin_tools() -> Vec<BoxedTool> {
    vec![
        Arc::new(SendMessageTool),
        Arc::new(ReadMessagesTool),
        Arc::new(ListChannelsTool),
    ]
}

pub fn register_all(registry: &mut ToolRegistry) -> usize {
    for tool in builtin_tools() {
        registry.register(tool);
    }
    info!("Loaded {} tools", registry.len());
    registry.len()
}

/// Look up a channel that can carry messages.
///
/// Unknown and non-text channels are caller errors; anything else Discord
/// reports is a platform failure.
pub(crate) async fn resolve_text_channel(
    platform: &dyn Platform,
    channel_id: &str,
) -> Result<Channel, BridgeError> {
    let channel = match platform.fetch_channel(channel_id).await {
        Ok(channel) => channel,
        Err(e) if e.is_not_found() => {
            return Err(BridgeError::invalid_request(format!(
                "Channel {} not found",
                channel_id
            )))
        }
        Err(e) => return Err(BridgeError::platform("fetch channel")(e)),
    };

    if !channel.kind.is_text_based() {
        return Err(BridgeError::invalid_request(format!(
            "Channel {} is not a text channel",
            channel_id
        )));
    }
    Ok(channel)
}

pub(crate) fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, BridgeError> {
    serde_json::to_string_pretty(value).map_err(|e| BridgeError::Platform {
        action: "encode result",
        source: e.into(),
    })
}

/// Numeric order of a snowflake id. Unparsable ids sort first.
pub(crate) fn snowflake_key(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}
