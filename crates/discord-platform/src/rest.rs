//! Discord REST Client
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Purpose |
//! |----------|--------|---------|
//! | `/users/@me` | GET | Identity of the bot |
//! | `/guilds/{id}?with_counts=true` | GET | Guild with approximate member count |
//! | `/guilds/{id}/channels` | GET | Guild channels |
//! | `/guilds/{id}/members/{user}` | GET | A guild member (used for the bot itself) |
//! | `/channels/{id}` | GET | Any channel or thread |
//! | `/channels/{id}/messages` | GET | Message history (`limit`, `before`, `after`, `around`) |
//! | `/channels/{id}/messages` | POST | Send a message |
//!
//! ## Authentication
//! - Header: `Authorization: Bot {DISCORD_TOKEN}`
//!
//! Failures are returned as-is: no retries, no rate-limit handling.

use crate::config::PlatformConfig;
use crate::error::{PlatformError, Result};
use crate::model::{Channel, CreateMessage, Guild, Member, Message, MessageQuery, User};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const USER_AGENT: &str = concat!("DiscordBot (discord-mcp, ", env!("CARGO_PKG_VERSION"), ")");

/// Error body returned by Discord on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct RestClient {
    client: Client,
    api_base: String,
    token: String,
}

impl RestClient {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            token: config.token.clone(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        Err(api_error(status, &text))
    }

    // =========================================================================
    // ENDPOINTS
    // =========================================================================

    pub async fn current_user(&self) -> Result<User> {
        self.send(self.get("/users/@me")).await
    }

    pub async fn get_guild(&self, guild_id: &str) -> Result<Guild> {
        debug!(guild = %guild_id, "REST fetch guild");
        self.send(
            self.get(&format!("/guilds/{}", guild_id))
                .query(&[("with_counts", "true")]),
        )
        .await
    }

    pub async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>> {
        self.send(self.get(&format!("/guilds/{}/channels", guild_id)))
            .await
    }

    pub async fn guild_member(&self, guild_id: &str, user_id: &str) -> Result<Member> {
        self.send(self.get(&format!("/guilds/{}/members/{}", guild_id, user_id)))
            .await
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Channel> {
        debug!(channel = %channel_id, "REST fetch channel");
        self.send(self.get(&format!("/channels/{}", channel_id)))
            .await
    }

    /// Newest-first page of messages. Anchors are passed through unchanged.
    pub async fn channel_messages(
        &self,
        channel_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>> {
        let mut params: Vec<(&str, String)> = vec![("limit", query.limit.to_string())];
        if let Some(before) = &query.before {
            params.push(("before", before.clone()));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }
        if let Some(around) = &query.around {
            params.push(("around", around.clone()));
        }

        self.send(
            self.get(&format!("/channels/{}/messages", channel_id))
                .query(&params),
        )
        .await
    }

    pub async fn create_message(&self, channel_id: &str, payload: &CreateMessage) -> Result<Message> {
        debug!(channel = %channel_id, "REST create message");
        self.send(
            self.post(&format!("/channels/{}/messages", channel_id))
                .json(payload),
        )
        .await
    }
}

fn api_error(status: StatusCode, body: &str) -> PlatformError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => PlatformError::Api {
            status: status.as_u16(),
            code: parsed.code,
            message: parsed.message,
        },
        Err(_) => PlatformError::Api {
            status: status.as_u16(),
            code: 0,
            message: status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string(),
        },
    }
}
