//! Platform Client Configuration
//!
//! The bot credential is read from `DISCORD_TOKEN`. Everything else has a
//! default that talks to the public Discord API (v10).

use crate::error::{PlatformError, Result};
use std::time::Duration;

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Gateway intent bits
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_VOICE_STATES: u64 = 1 << 7;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    pub const DEFAULT: u64 = GUILDS | GUILD_MESSAGES | GUILD_VOICE_STATES | MESSAGE_CONTENT;
}

#[derive(Clone)]
pub struct PlatformConfig {
    pub token: String,
    pub api_base: String,
    pub gateway_url: String,
    pub intents: u64,
    /// Per-request REST timeout
    pub request_timeout: Duration,
    /// How long to wait for unavailable guilds after READY
    pub guild_ready_timeout: Duration,
}

impl PlatformConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            intents: intents::DEFAULT,
            request_timeout: Duration::from_secs(15),
            guild_ready_timeout: Duration::from_secs(15),
        }
    }

    /// Build a config from `DISCORD_TOKEN`. A missing or blank token is an error.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                PlatformError::Config(format!("{} environment variable is not set", TOKEN_ENV))
            })?;
        Ok(Self::new(token.trim()))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: impl Into<String>) -> Self {
        self.gateway_url = gateway_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_guild_ready_timeout(mut self, timeout: Duration) -> Self {
        self.guild_ready_timeout = timeout;
        self
    }
}

// The token never shows up in logs.
impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("token", &"***")
            .field("api_base", &self.api_base)
            .field("gateway_url", &self.gateway_url)
            .field("intents", &self.intents)
            .field("request_timeout", &self.request_timeout)
            .field("guild_ready_timeout", &self.guild_ready_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::new("abc");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.intents & intents::GUILDS, intents::GUILDS);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_api_base_trailing_slash() {
        let config = PlatformConfig::new("abc").with_api_base("http://localhost:8080/api/");
        assert_eq!(config.api_base, "http://localhost:8080/api");
    }

    #[test]
    fn test_debug_hides_token() {
        let config = PlatformConfig::new("super-secret");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
    }
}
