//! Gateway Session
//!
//! Long-lived websocket session that authenticates the bot and keeps the
//! [`Cache`] current.
//!
//! ## Handshake
//! 1. Connect to the gateway URL
//! 2. Receive `HELLO` (op 10) with the heartbeat interval
//! 3. Send `IDENTIFY` (op 2) with token and intents
//! 4. Receive `READY`, then one `GUILD_CREATE` per guild
//!
//! The session counts as ready once every guild announced in `READY` has
//! arrived, or when the guild wait times out. Failures before that point fail
//! the login; disconnects after it are re-identified with backoff.

use crate::cache::Cache;
use crate::config::PlatformConfig;
use crate::error::{PlatformError, Result};
use crate::model::User;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, RwLock};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

type GatewaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub mod opcodes {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hello {
    heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
struct UnavailableGuild {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Ready {
    user: User,
    #[serde(default)]
    guilds: Vec<UnavailableGuild>,
}

/// Install the process-wide rustls provider used for `wss://` connects.
/// A provider installed earlier by the host process is left in place.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Close codes after which reconnecting cannot succeed
pub fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

fn describe_close(code: u16) -> &'static str {
    match code {
        4004 => "authentication failed (invalid token)",
        4010 => "invalid shard",
        4011 => "sharding required",
        4012 => "invalid API version",
        4013 => "invalid intents",
        4014 => "disallowed intents (enable them in the developer portal)",
        _ => "connection closed",
    }
}

pub fn identify_payload(token: &str, intents: u64) -> Value {
    json!({
        "op": opcodes::IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "discord-mcp",
                "device": "discord-mcp"
            }
        }
    })
}

pub fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({ "op": opcodes::HEARTBEAT, "d": sequence })
}

// =============================================================================
// READINESS TRACKING
// =============================================================================

/// Tracks which guilds announced in `READY` are still outstanding
#[derive(Debug, Default)]
pub struct ReadyTracker {
    pending: Option<HashSet<String>>,
    complete: bool,
}

impl ReadyTracker {
    /// Returns `true` when this completes readiness.
    pub fn on_ready(&mut self, guild_ids: impl IntoIterator<Item = String>) -> bool {
        let pending: HashSet<String> = guild_ids.into_iter().collect();
        let empty = pending.is_empty();
        self.pending = Some(pending);
        empty && self.finish()
    }

    /// Returns `true` when this completes readiness.
    pub fn on_guild_create(&mut self, guild_id: &str) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.remove(guild_id);
                pending.is_empty() && self.finish()
            }
            None => false,
        }
    }

    /// Returns `true` when this completes readiness.
    pub fn on_timeout(&mut self) -> bool {
        self.pending.is_some() && self.finish()
    }

    pub fn awaiting_guilds(&self) -> bool {
        !self.complete && self.pending.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn finish(&mut self) -> bool {
        if self.complete {
            return false;
        }
        self.complete = true;
        true
    }
}

// =============================================================================
// SESSION
// =============================================================================

enum Outcome {
    /// Reconnect with a fresh identify
    Disconnected(String),
    /// Give up
    Fatal(PlatformError),
}

struct Session {
    config: PlatformConfig,
    cache: Arc<RwLock<Cache>>,
    ready_tx: Option<oneshot::Sender<Result<User>>>,
}

impl Session {
    fn is_ready(&self) -> bool {
        self.ready_tx.is_none()
    }

    fn signal(&mut self, result: Result<User>) {
        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(result);
        }
    }
}

/// Connect, identify and drive the session in a background task.
/// Resolves with the bot user once the session is ready.
pub(crate) async fn login(config: PlatformConfig, cache: Arc<RwLock<Cache>>) -> Result<User> {
    let (socket, interval) = connect_and_identify(&config).await?;
    let (ready_tx, ready_rx) = oneshot::channel();

    let session = Session {
        config,
        cache,
        ready_tx: Some(ready_tx),
    };
    tokio::spawn(supervise(session, socket, interval));

    ready_rx
        .await
        .map_err(|_| PlatformError::gateway("Gateway session ended before becoming ready"))?
}

async fn connect_and_identify(config: &PlatformConfig) -> Result<(GatewaySocket, Duration)> {
    install_crypto_provider();
    debug!(url = %config.gateway_url, "Connecting to gateway");
    let (mut socket, _) = connect_async(config.gateway_url.as_str()).await?;

    let hello = loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => {
                let payload: GatewayPayload = serde_json::from_str(&text)?;
                if payload.op == opcodes::HELLO {
                    break serde_json::from_value::<Hello>(payload.d)?;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let code = frame.map(|f| u16::from(f.code)).unwrap_or(1000);
                return Err(close_error(code));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(PlatformError::gateway("Gateway closed before HELLO")),
        }
    };

    let identify = identify_payload(&config.token, config.intents);
    socket.send(Message::Text(identify.to_string())).await?;

    Ok((socket, Duration::from_millis(hello.heartbeat_interval)))
}

fn close_error(code: u16) -> PlatformError {
    if code == 4004 {
        PlatformError::authentication(describe_close(code))
    } else {
        PlatformError::gateway(format!("Gateway closed with {}: {}", code, describe_close(code)))
    }
}

async fn supervise(mut session: Session, mut socket: GatewaySocket, mut interval: Duration) {
    let mut attempt = 0u32;

    loop {
        let outcome = run_connection(&mut session, &mut socket, interval).await;

        let reason = match outcome {
            Outcome::Fatal(e) => {
                error!(error = %e, "Gateway session terminated");
                session.signal(Err(e));
                return;
            }
            Outcome::Disconnected(reason) if !session.is_ready() => {
                session.signal(Err(PlatformError::gateway(reason)));
                return;
            }
            Outcome::Disconnected(reason) => reason,
        };

        loop {
            attempt += 1;
            let delay = backoff_delay(attempt);
            warn!(reason = %reason, attempt, delay_ms = delay.as_millis() as u64, "Gateway disconnected, reconnecting");
            time::sleep(delay).await;

            match connect_and_identify(&session.config).await {
                Ok((fresh, fresh_interval)) => {
                    socket = fresh;
                    interval = fresh_interval;
                    attempt = 0;
                    info!("Gateway reconnected");
                    break;
                }
                Err(e @ PlatformError::Authentication(_)) => {
                    error!(error = %e, "Gateway reconnect rejected");
                    return;
                }
                Err(e) => warn!(error = %e, "Gateway reconnect failed"),
            }
        }
    }
}

pub fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
    RECONNECT_BASE_DELAY
        .saturating_mul(multiplier)
        .min(RECONNECT_MAX_DELAY)
}

async fn run_connection(
    session: &mut Session,
    socket: &mut GatewaySocket,
    interval: Duration,
) -> Outcome {
    let mut heartbeat = time::interval(interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    let mut sequence: Option<u64> = None;
    let mut tracker = ReadyTracker::default();
    // A reconnect after readiness must not wait for guilds again
    if session.is_ready() {
        tracker.finish();
    }
    let mut guild_deadline: Option<Instant> = None;

    loop {
        let deadline = guild_deadline.filter(|_| tracker.awaiting_guilds());

        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = heartbeat_payload(sequence).to_string();
                if let Err(e) = socket.send(Message::Text(beat)).await {
                    return Outcome::Disconnected(format!("heartbeat failed: {}", e));
                }
            }
            _ = async { time::sleep_until(deadline.unwrap_or_else(Instant::now)).await }, if deadline.is_some() => {
                if tracker.on_timeout() {
                    warn!("Timed out waiting for guilds, continuing with a partial cache");
                    signal_ready(session).await;
                }
            }
            frame = socket.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code)).unwrap_or(1000);
                        if is_fatal_close(code) {
                            return Outcome::Fatal(close_error(code));
                        }
                        return Outcome::Disconnected(format!("closed with {}", code));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Outcome::Disconnected(e.to_string()),
                    None => return Outcome::Disconnected("stream ended".into()),
                };

                let payload: GatewayPayload = match serde_json::from_str(&text) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "Ignoring undecodable gateway frame");
                        continue;
                    }
                };

                match payload.op {
                    opcodes::DISPATCH => {
                        if payload.s.is_some() {
                            sequence = payload.s;
                        }
                        let event = payload.t.unwrap_or_default();
                        if let Err(e) = handle_dispatch(session, &mut tracker, &event, payload.d).await {
                            warn!(event = %event, error = %e, "Failed to apply dispatch");
                        }
                        if event == "READY" && tracker.awaiting_guilds() {
                            guild_deadline = Some(Instant::now() + session.config.guild_ready_timeout);
                        }
                    }
                    opcodes::HEARTBEAT => {
                        let beat = heartbeat_payload(sequence).to_string();
                        if let Err(e) = socket.send(Message::Text(beat)).await {
                            return Outcome::Disconnected(format!("heartbeat failed: {}", e));
                        }
                    }
                    opcodes::RECONNECT => return Outcome::Disconnected("server requested reconnect".into()),
                    opcodes::INVALID_SESSION => return Outcome::Disconnected("invalid session".into()),
                    opcodes::HEARTBEAT_ACK => {}
                    other => debug!(op = other, "Unhandled gateway opcode"),
                }
            }
        }
    }
}

async fn handle_dispatch(
    session: &mut Session,
    tracker: &mut ReadyTracker,
    event: &str,
    data: Value,
) -> Result<()> {
    match event {
        "READY" => {
            let ready: Ready = serde_json::from_value(data)?;
            info!(user = %ready.user.username, guilds = ready.guilds.len(), "Gateway READY");
            session.cache.write().await.set_current_user(ready.user);
            if tracker.on_ready(ready.guilds.into_iter().map(|g| g.id)) {
                signal_ready(session).await;
            }
        }
        "GUILD_CREATE" => {
            let guild_id = data
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            session.cache.write().await.apply(event, data)?;
            if let Some(id) = guild_id {
                if tracker.on_guild_create(&id) {
                    signal_ready(session).await;
                }
            }
        }
        _ => session.cache.write().await.apply(event, data)?,
    }
    Ok(())
}

async fn signal_ready(session: &mut Session) {
    let user = session.cache.read().await.current_user().cloned();
    match user {
        Some(user) => session.signal(Ok(user)),
        None => session.signal(Err(PlatformError::gateway("READY carried no user"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_without_guilds_completes_immediately() {
        let mut tracker = ReadyTracker::default();
        assert!(tracker.on_ready(Vec::<String>::new()));
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_ready_waits_for_every_guild() {
        let mut tracker = ReadyTracker::default();
        assert!(!tracker.on_ready(vec!["1".to_string(), "2".to_string()]));
        assert!(tracker.awaiting_guilds());
        assert!(!tracker.on_guild_create("1"));
        assert!(tracker.on_guild_create("2"));
        // Only one transition
        assert!(!tracker.on_guild_create("3"));
        assert!(!tracker.on_timeout());
    }

    #[test]
    fn test_timeout_completes_partial_ready() {
        let mut tracker = ReadyTracker::default();
        tracker.on_ready(vec!["1".to_string()]);
        assert!(tracker.on_timeout());
        assert!(!tracker.awaiting_guilds());
    }

    #[test]
    fn test_guild_create_before_ready_is_ignored() {
        let mut tracker = ReadyTracker::default();
        assert!(!tracker.on_guild_create("1"));
        assert!(!tracker.on_timeout());
    }

    #[test]
    fn test_fatal_close_codes() {
        assert!(is_fatal_close(4004));
        assert!(is_fatal_close(4014));
        assert!(!is_fatal_close(4000));
        assert!(!is_fatal_close(1000));
        assert!(matches!(close_error(4004), PlatformError::Authentication(_)));
    }

    #[test]
    fn test_payloads() {
        let identify = identify_payload("tok", 513);
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "tok");
        assert_eq!(identify["d"]["intents"], 513);

        assert_eq!(heartbeat_payload(None), json!({"op": 1, "d": null}));
        assert_eq!(heartbeat_payload(Some(42)), json!({"op": 1, "d": 42}));
    }

    #[test]
    fn test_crypto_provider_installed_for_tls() {
        install_crypto_provider();
        // Second call keeps the first provider
        install_crypto_provider();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(30), RECONNECT_MAX_DELAY);
    }
}
