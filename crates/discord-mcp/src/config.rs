//! Server settings
//!
//! Built-in defaults, then an optional TOML file, then `DISCORD_MCP__*`
//! environment variables. The bot token itself is only ever read from
//! `DISCORD_TOKEN`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use discord_platform::config::{DEFAULT_API_BASE, DEFAULT_GATEWAY_URL};
use discord_platform::PlatformConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "discord-mcp.toml";
pub const ENV_PREFIX: &str = "DISCORD_MCP";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub name: String,
    pub log_level: String,
    pub api_base: String,
    pub gateway_url: String,
    pub request_timeout_secs: u64,
    pub guild_ready_timeout_secs: u64,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::new(&path.to_string_lossy(), FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        Config::builder()
            .set_default("name", crate::server::SERVER_NAME)?
            .set_default("log_level", "info")?
            .set_default("api_base", DEFAULT_API_BASE)?
            .set_default("gateway_url", DEFAULT_GATEWAY_URL)?
            .set_default("request_timeout_secs", 15_i64)?
            .set_default("guild_ready_timeout_secs", 15_i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Platform configuration with `token` and these endpoints and timeouts
    pub fn platform_config(&self, token: impl Into<String>) -> PlatformConfig {
        PlatformConfig::new(token)
            .with_api_base(self.api_base.as_str())
            .with_gateway_url(self.gateway_url.as_str())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_guild_ready_timeout(Duration::from_secs(self.guild_ready_timeout_secs))
    }
}
