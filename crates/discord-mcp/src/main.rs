//! discord-mcp: MCP server for a Discord bot
//!
//!   DISCORD_TOKEN=... discord-mcp
//!   discord-mcp --config ./discord-mcp.toml --log-level debug
//!
//! stdout carries protocol frames only; all logging goes to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use discord_mcp::config::Settings;
use discord_mcp::transport::StdioTransport;
use discord_mcp::{Coordinator, ServerInfo};
use discord_platform::config::TOKEN_ENV;
use discord_platform::DiscordClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "discord-mcp")]
#[command(about = "MCP server exposing Discord channels and messages", version)]
struct Cli {
    /// Settings file (TOML). Defaults to ./discord-mcp.toml if present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Server name override
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        // Printed directly: the failure may precede logging setup
        eprintln!("{}", fatal_message(&e));
        std::process::exit(1);
    }
}

/// One stderr line with the full cause chain
fn fatal_message(e: &anyhow::Error) -> String {
    format!("discord-mcp: {:#}", e)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(name) = cli.name {
        settings.name = name;
    }

    // Logging goes to stderr so it never mixes with protocol frames
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let token = std::env::var(TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .with_context(|| format!("{} environment variable is not set", TOKEN_ENV))?;

    let client = DiscordClient::new(settings.platform_config(token.trim()))
        .context("failed to create Discord client")?;

    info!(name = %settings.name, "Starting discord-mcp");

    let coordinator = Coordinator::new(
        Arc::new(client),
        ServerInfo {
            name: settings.name,
            ..ServerInfo::default()
        },
    );
    coordinator.run(StdioTransport::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_message_is_one_line_with_causes() {
        let e = anyhow::anyhow!("Authentication failed: invalid token").context("Discord login failed");
        let message = fatal_message(&e);
        assert_eq!(
            message,
            "discord-mcp: Discord login failed: Authentication failed: invalid token"
        );
        assert_eq!(message.lines().count(), 1);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["discord-mcp", "--log-level", "debug", "--name", "bot"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.name.as_deref(), Some("bot"));
        assert!(cli.config.is_none());
    }
}
