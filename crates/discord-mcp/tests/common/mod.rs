//! In-memory `Platform` used by the bridge tests

#![allow(dead_code)]

use async_trait::async_trait;
use discord_mcp::{BridgeServer, McpRequest, McpResponse, Readiness, ServerInfo};
use discord_platform::{
    Channel, ChannelKind, CreateMessage, GuildSummary, Message, MessageQuery, PermissionSummary,
    Platform, PlatformError, Result, User,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakePlatform {
    pub guilds: Vec<GuildSummary>,
    pub channels: Vec<Channel>,
    /// Newest first, as Discord returns them
    pub messages: HashMap<String, Vec<Message>>,
    pub voice: HashMap<String, usize>,
    pub send_error: Option<(u16, u64, String)>,
    pub login_error: Option<String>,
    pub calls: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, CreateMessage)>>,
    pub queries: Mutex<Vec<MessageQuery>>,
}

impl FakePlatform {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(String, CreateMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

pub fn bot_user() -> User {
    User {
        id: "900".into(),
        username: "bridge-bot".into(),
        global_name: None,
        bot: true,
    }
}

pub fn user(id: &str) -> User {
    User {
        id: id.into(),
        username: format!("user-{}", id),
        global_name: None,
        bot: false,
    }
}

pub fn channel(id: &str, kind: ChannelKind, name: &str) -> Channel {
    Channel {
        id: id.into(),
        kind,
        guild_id: Some("G".into()),
        name: Some(name.into()),
        ..Default::default()
    }
}

pub fn message(id: &str, author: &str) -> Message {
    Message {
        id: id.into(),
        channel_id: "C".into(),
        author: user(author),
        content: format!("message {}", id),
        timestamp: format!("2024-01-01T00:00:{:02}+00:00", id.parse::<u32>().unwrap_or(0) % 60),
        edited_timestamp: None,
        attachments: Vec::new(),
        embeds: Vec::new(),
        reactions: Vec::new(),
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn login(&self) -> Result<User> {
        self.record("login");
        match &self.login_error {
            Some(reason) => Err(PlatformError::authentication(reason.clone())),
            None => Ok(bot_user()),
        }
    }

    async fn current_user(&self) -> Option<User> {
        Some(bot_user())
    }

    async fn cached_guilds(&self) -> Vec<GuildSummary> {
        self.record("cached_guilds");
        self.guilds.clone()
    }

    async fn fetch_guild(&self, guild_id: &str) -> Result<GuildSummary> {
        self.record(format!("fetch_guild:{}", guild_id));
        self.guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(format!("guild {}", guild_id)))
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Channel> {
        self.record(format!("fetch_channel:{}", channel_id));
        self.channels
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(format!("channel {}", channel_id)))
    }

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>> {
        self.record(format!("guild_channels:{}", guild_id));
        Ok(self
            .channels
            .iter()
            .filter(|c| c.guild_id.as_deref() == Some(guild_id))
            .cloned()
            .collect())
    }

    async fn fetch_messages(&self, channel_id: &str, query: &MessageQuery) -> Result<Vec<Message>> {
        self.record(format!("fetch_messages:{}", channel_id));
        self.queries.lock().unwrap().push(query.clone());
        Ok(self
            .messages
            .get(channel_id)
            .map(|m| m.iter().take(query.limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn send_message(&self, channel_id: &str, payload: &CreateMessage) -> Result<Message> {
        self.record(format!("send_message:{}", channel_id));
        if let Some((status, code, message)) = &self.send_error {
            return Err(PlatformError::Api {
                status: *status,
                code: *code,
                message: message.clone(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), payload.clone()));
        Ok(Message {
            content: payload.content.clone().unwrap_or_default(),
            ..message("5000", "900")
        })
    }

    async fn permissions_for_self(&self, channel: &Channel) -> Result<PermissionSummary> {
        self.record(format!("permissions_for_self:{}", channel.id));
        Ok(PermissionSummary {
            view_channel: true,
            send_messages: channel.kind != ChannelKind::GuildVoice,
            ..Default::default()
        })
    }

    async fn voice_occupancy(&self, _guild_id: &str, channel_id: &str) -> usize {
        self.record(format!("voice_occupancy:{}", channel_id));
        self.voice.get(channel_id).copied().unwrap_or(0)
    }
}

/// A server over `platform`, optionally already marked ready
pub fn server(platform: Arc<FakePlatform>, ready: bool) -> BridgeServer {
    let readiness = Readiness::new();
    if ready {
        readiness.mark_ready();
    }
    BridgeServer::new(ServerInfo::default(), platform, readiness)
}

pub async fn call_tool(server: &BridgeServer, name: &str, arguments: Value) -> McpResponse {
    let request = McpRequest::new("tools/call")
        .with_id(1)
        .with_params(json!({ "name": name, "arguments": arguments }));
    server.handle_request(request).await
}

/// Text payload of a successful tool call
pub fn text_of(response: &McpResponse) -> String {
    assert!(response.is_success(), "unexpected error: {:?}", response.error);
    response.result.as_ref().unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Parsed JSON payload of a successful tool call
pub fn json_of(response: &McpResponse) -> Value {
    serde_json::from_str(&text_of(response)).unwrap()
}
