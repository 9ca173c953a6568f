//! Platform Client
//!
//! [`Platform`] is the seam between the bridge and Discord. [`DiscordClient`]
//! implements it with the gateway cache first and REST as the fallback for
//! anything not cached yet.

use crate::cache::Cache;
use crate::config::PlatformConfig;
use crate::error::{PlatformError, Result};
use crate::gateway;
use crate::model::{Channel, CreateMessage, Guild, GuildSummary, Message, MessageQuery, User};
use crate::permissions::PermissionSummary;
use crate::rest::RestClient;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Operations the bridge needs from the chat platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Authenticate and resolve once the session reports ready.
    async fn login(&self) -> Result<User>;

    /// Identity of the logged-in session, once known
    async fn current_user(&self) -> Option<User>;

    /// Guilds currently held in memory
    async fn cached_guilds(&self) -> Vec<GuildSummary>;

    async fn fetch_guild(&self, guild_id: &str) -> Result<GuildSummary>;

    async fn fetch_channel(&self, channel_id: &str) -> Result<Channel>;

    /// Cached channels and threads of a guild
    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>>;

    /// Newest-first messages of a channel
    async fn fetch_messages(&self, channel_id: &str, query: &MessageQuery) -> Result<Vec<Message>>;

    async fn send_message(&self, channel_id: &str, payload: &CreateMessage) -> Result<Message>;

    /// Effective permissions of the session in a guild channel
    async fn permissions_for_self(&self, channel: &Channel) -> Result<PermissionSummary>;

    /// Members currently connected to a voice channel
    async fn voice_occupancy(&self, guild_id: &str, channel_id: &str) -> usize;
}

pub struct DiscordClient {
    config: PlatformConfig,
    rest: RestClient,
    cache: Arc<RwLock<Cache>>,
}

impl DiscordClient {
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let rest = RestClient::new(&config)?;
        Ok(Self {
            config,
            rest,
            cache: Arc::new(RwLock::new(Cache::new())),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(PlatformConfig::from_env()?)
    }

    pub fn cache(&self) -> Arc<RwLock<Cache>> {
        Arc::clone(&self.cache)
    }

    /// Load a guild the gateway has not delivered (yet) through REST.
    async fn ensure_guild(&self, guild_id: &str) -> Result<()> {
        if self.cache.read().await.guild(guild_id).is_some() {
            return Ok(());
        }

        debug!(guild = %guild_id, "Guild not cached, loading via REST");
        let mut guild: Guild = self.rest.get_guild(guild_id).await?;
        guild.channels = self.rest.guild_channels(guild_id).await?;
        self.cache.write().await.insert_guild(guild);
        Ok(())
    }
}

#[async_trait]
impl Platform for DiscordClient {
    async fn login(&self) -> Result<User> {
        gateway::login(self.config.clone(), self.cache()).await
    }

    async fn current_user(&self) -> Option<User> {
        self.cache.read().await.current_user().cloned()
    }

    async fn cached_guilds(&self) -> Vec<GuildSummary> {
        self.cache.read().await.guild_summaries()
    }

    async fn fetch_guild(&self, guild_id: &str) -> Result<GuildSummary> {
        self.ensure_guild(guild_id).await?;
        self.cache
            .read()
            .await
            .guild_summary(guild_id)
            .ok_or_else(|| PlatformError::not_found(format!("guild {}", guild_id)))
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Channel> {
        if let Some(channel) = self.cache.read().await.channel(channel_id) {
            return Ok(channel);
        }

        let channel = self.rest.get_channel(channel_id).await?;
        self.cache.write().await.insert_channel(channel.clone());
        Ok(channel)
    }

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>> {
        self.ensure_guild(guild_id).await?;
        self.cache
            .read()
            .await
            .guild_channels(guild_id)
            .ok_or_else(|| PlatformError::not_found(format!("guild {}", guild_id)))
    }

    async fn fetch_messages(&self, channel_id: &str, query: &MessageQuery) -> Result<Vec<Message>> {
        self.rest.channel_messages(channel_id, query).await
    }

    async fn send_message(&self, channel_id: &str, payload: &CreateMessage) -> Result<Message> {
        self.rest.create_message(channel_id, payload).await
    }

    async fn permissions_for_self(&self, channel: &Channel) -> Result<PermissionSummary> {
        let guild_id = channel
            .guild_id
            .as_deref()
            .ok_or_else(|| PlatformError::not_found(format!("guild of channel {}", channel.id)))?;

        let (needs_member, user_id) = {
            let cache = self.cache.read().await;
            let user_id = cache
                .current_user()
                .map(|u| u.id.clone())
                .ok_or_else(|| PlatformError::gateway("session has no current user"))?;
            (!cache.has_self_member(guild_id), user_id)
        };

        if needs_member {
            let member = self.rest.guild_member(guild_id, &user_id).await?;
            self.cache.write().await.set_member(guild_id, member);
        }

        self.cache
            .read()
            .await
            .self_permissions(channel)
            .map(PermissionSummary::from)
            .ok_or_else(|| PlatformError::not_found(format!("guild {}", guild_id)))
    }

    async fn voice_occupancy(&self, guild_id: &str, channel_id: &str) -> usize {
        self.cache.read().await.voice_occupancy(guild_id, channel_id)
    }
}
