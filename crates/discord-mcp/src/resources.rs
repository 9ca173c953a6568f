//! Resource Catalog for MCP
//!
//! One resource: `discord://guilds`, the guilds held by the session.

use crate::error::BridgeError;
use crate::tools::pretty_json;
use discord_platform::{GuildSummary, Platform};
use serde::Serialize;

pub const GUILDS_URI: &str = "discord://guilds";
pub const JSON_MIME: &str = "application/json";

/// Descriptor returned by `resources/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// Content of a `resources/read` result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GuildView {
    id: String,
    name: String,
    member_count: u64,
}

impl From<GuildSummary> for GuildView {
    fn from(guild: GuildSummary) -> Self {
        Self {
            id: guild.id,
            name: guild.name,
            member_count: guild.member_count,
        }
    }
}

const GUILDS: ResourceInfo = ResourceInfo {
    uri: GUILDS_URI,
    name: "Discord Guilds",
    description: "Servers the bot is a member of",
    mime_type: JSON_MIME,
};

pub fn list_resources() -> Vec<ResourceInfo> {
    vec![GUILDS]
}

pub async fn read_resource(
    platform: &dyn Platform,
    uri: &str,
) -> Result<ResourceContents, BridgeError> {
    if uri != GUILDS_URI {
        return Err(BridgeError::invalid_request(format!(
            "Unknown resource: {}",
            uri
        )));
    }

    let guilds: Vec<GuildView> = platform
        .cached_guilds()
        .await
        .into_iter()
        .map(GuildView::from)
        .collect();

    Ok(ResourceContents {
        uri: uri.to_string(),
        mime_type: JSON_MIME,
        text: pretty_json(&guilds)?,
    })
}
