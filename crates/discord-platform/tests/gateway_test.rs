//! Gateway login against a local websocket server speaking the Discord handshake

use discord_platform::{DiscordClient, Platform, PlatformConfig, PlatformError};
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};

type ServerSocket = WebSocketStream<TcpStream>;

/// Accept one gateway connection and hand it to `script`. Returns the ws:// URL.
async fn gateway_server<F, Fut>(script: F) -> String
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = accept_async(stream).await.unwrap();
        script(socket).await;
    });
    format!("ws://{}/?v=10&encoding=json", addr)
}

fn client(url: &str) -> DiscordClient {
    DiscordClient::new(PlatformConfig::new("test-token").with_gateway_url(url)).unwrap()
}

async fn send(socket: &mut ServerSocket, payload: Value) {
    socket.send(Message::Text(payload.to_string())).await.unwrap();
}

/// HELLO, then read the IDENTIFY frame
async fn handshake(socket: &mut ServerSocket) -> Value {
    send(socket, json!({"op": 10, "d": {"heartbeat_interval": 45000}})).await;
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("connection ended before IDENTIFY: {:?}", other),
        }
    }
}

fn ready(guild_ids: &[&str]) -> Value {
    let guilds: Vec<Value> = guild_ids
        .iter()
        .map(|id| json!({"id": id, "unavailable": true}))
        .collect();
    json!({
        "op": 0,
        "t": "READY",
        "s": 1,
        "d": {
            "v": 10,
            "user": {"id": "900", "username": "bridge-bot", "bot": true},
            "guilds": guilds,
            "session_id": "session"
        }
    })
}

fn guild_create(id: &str, name: &str, sequence: u64) -> Value {
    json!({
        "op": 0,
        "t": "GUILD_CREATE",
        "s": sequence,
        "d": {"id": id, "name": name, "member_count": 3, "channels": [], "roles": []}
    })
}

/// Keep the connection open until the client goes away
async fn hold(mut socket: ServerSocket) {
    while let Some(Ok(_)) = socket.next().await {}
}

#[tokio::test]
async fn test_login_identifies_and_waits_for_every_guild() {
    let (identify_tx, mut identify_rx) = mpsc::unbounded_channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let url = gateway_server(move |mut socket| async move {
        let identify = handshake(&mut socket).await;
        identify_tx.send(identify).unwrap();
        send(&mut socket, ready(&["1", "2"])).await;
        send(&mut socket, guild_create("1", "Alpha", 2)).await;
        let _ = release_rx.await;
        send(&mut socket, guild_create("2", "Beta", 3)).await;
        hold(socket).await;
    })
    .await;

    let client = std::sync::Arc::new(client(&url));
    let login = tokio::spawn({
        let client = client.clone();
        async move { client.login().await }
    });

    let identify = identify_rx.recv().await.unwrap();
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], "test-token");
    assert!(identify["d"]["intents"].as_u64().unwrap() & 1 == 1);
    assert_eq!(identify["d"]["properties"]["browser"], "discord-mcp");

    // One guild is still outstanding
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!login.is_finished());

    release_tx.send(()).unwrap();
    let user = tokio::time::timeout(Duration::from_secs(5), login)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(user.id, "900");
    assert!(user.bot);

    let mut names: Vec<String> = client.cached_guilds().await.into_iter().map(|g| g.name).collect();
    names.sort();
    assert_eq!(names, vec!["Alpha".to_string(), "Beta".to_string()]);
    assert_eq!(client.current_user().await.map(|u| u.username), Some("bridge-bot".to_string()));
}

#[tokio::test]
async fn test_login_completes_after_guild_wait_times_out() {
    let url = gateway_server(|mut socket| async move {
        handshake(&mut socket).await;
        send(&mut socket, ready(&["1", "2"])).await;
        send(&mut socket, guild_create("1", "Alpha", 2)).await;
        hold(socket).await;
    })
    .await;

    let client = DiscordClient::new(
        PlatformConfig::new("test-token")
            .with_gateway_url(url)
            .with_guild_ready_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    let user = tokio::time::timeout(Duration::from_secs(5), client.login())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.username, "bridge-bot");

    let guilds = client.cached_guilds().await;
    assert_eq!(guilds.len(), 1);
    assert_eq!(guilds[0].id, "1");
}

#[tokio::test]
async fn test_login_without_guilds_is_ready_on_ready() {
    let url = gateway_server(|mut socket| async move {
        handshake(&mut socket).await;
        send(&mut socket, ready(&[])).await;
        hold(socket).await;
    })
    .await;

    let user = tokio::time::timeout(Duration::from_secs(5), client(&url).login())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, "900");
}

#[tokio::test]
async fn test_invalid_token_close_fails_login() {
    let url = gateway_server(|mut socket| async move {
        handshake(&mut socket).await;
        let frame = CloseFrame {
            code: CloseCode::from(4004),
            reason: "Authentication failed.".into(),
        };
        let _ = socket.close(Some(frame)).await;
        hold(socket).await;
    })
    .await;

    let result = tokio::time::timeout(Duration::from_secs(5), client(&url).login())
        .await
        .unwrap();
    assert!(
        matches!(result, Err(PlatformError::Authentication(_))),
        "unexpected result: {:?}",
        result
    );
}

#[tokio::test]
async fn test_tls_connect_failure_is_an_error() {
    // A plain TCP peer that hangs up mid TLS handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let client = client(&format!("wss://{}/?v=10&encoding=json", addr));
    let result = tokio::time::timeout(Duration::from_secs(5), client.login())
        .await
        .unwrap();
    assert!(result.is_err());
}
