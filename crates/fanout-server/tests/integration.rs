//! End-to-end tests using real WebSocket clients against a bound listener.

#![allow(missing_docs)]

use std::net::SocketAddr;
use std::time::Duration;

use fanout_hub::{Hub, HubConfig, PumpConfig};
use fanout_server::{FanoutServer, ServerConfig};
use futures::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn boot(config: ServerConfig) -> (FanoutServer, SocketAddr) {
    let (hub, handle) = Hub::new(HubConfig::default());
    let _hub_task = tokio::spawn(hub.run());
    let server = FanoutServer::new(config, handle);
    let (addr, _serve) = server.listen().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _resp) = timeout(TIMEOUT, connect_async(format!("ws://{addr}/ws")))
        .await
        .unwrap()
        .unwrap();
    ws
}

async fn wait_for_members(server: &FanoutServer, n: usize) {
    timeout(TIMEOUT, async {
        while server.hub().stats().active != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("hub never reached {n} members"));
}

/// Next application message, skipping keep-alive frames.
async fn next_message(ws: &mut WsStream) -> Option<Message> {
    loop {
        match timeout(TIMEOUT, ws.next()).await.ok()?? {
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(msg) => return Some(msg),
            Err(_) => return None,
        }
    }
}

#[tokio::test]
async fn two_clients_relay_without_echo() {
    let (server, addr) = boot(ServerConfig::default()).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_members(&server, 2).await;

    a.send(Message::text("hello from a")).await.unwrap();
    match next_message(&mut b).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "hello from a"),
        other => panic!("expected text, got {other:?}"),
    }

    b.send(Message::text("hello from b")).await.unwrap();
    match next_message(&mut a).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "hello from b"),
        other => panic!("expected text, got {other:?}"),
    }

    // Neither side saw its own message.
    assert!(
        timeout(Duration::from_millis(200), a.next()).await.is_err(),
        "sender received its own message"
    );
}

#[tokio::test]
async fn binary_messages_are_preserved() {
    let (server, addr) = boot(ServerConfig::default()).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_members(&server, 2).await;

    let data = vec![0u8, 255, 1, 254];
    a.send(Message::binary(data.clone())).await.unwrap();
    match next_message(&mut b).await {
        Some(Message::Binary(got)) => assert_eq!(got.as_ref(), data.as_slice()),
        other => panic!("expected binary, got {other:?}"),
    }
}

#[tokio::test]
async fn echo_mode_delivers_to_sender() {
    let config = ServerConfig {
        pump: PumpConfig {
            echo_to_sender: true,
            ..PumpConfig::default()
        },
        ..ServerConfig::default()
    };
    let (server, addr) = boot(config).await;
    let mut a = connect(addr).await;
    wait_for_members(&server, 1).await;

    a.send(Message::text("me")).await.unwrap();
    match next_message(&mut a).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "me"),
        other => panic!("expected echo, got {other:?}"),
    }
}

#[tokio::test]
async fn client_close_unregisters() {
    let (server, addr) = boot(ServerConfig::default()).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_members(&server, 2).await;

    a.close(None).await.unwrap();
    wait_for_members(&server, 1).await;

    // The remaining client still works as a recipient.
    let mut c = connect(addr).await;
    wait_for_members(&server, 2).await;
    c.send(Message::text("still here")).await.unwrap();
    match next_message(&mut b).await {
        Some(Message::Text(text)) => assert_eq!(text.as_str(), "still here"),
        other => panic!("expected text, got {other:?}"),
    }
    assert_eq!(server.hub().stats().unregistrations, 1);
}

#[tokio::test]
async fn oversize_message_drops_connection() {
    let config = ServerConfig {
        pump: PumpConfig {
            max_message_size: 64,
            ..PumpConfig::default()
        },
        ..ServerConfig::default()
    };
    let (server, addr) = boot(config).await;
    let mut a = connect(addr).await;
    wait_for_members(&server, 1).await;

    a.send(Message::text("x".repeat(1024))).await.unwrap();
    // Connection ends: close frame, error, or end of stream.
    let outcome = next_message(&mut a).await;
    assert!(
        matches!(outcome, None | Some(Message::Close(_))),
        "unexpected {outcome:?}"
    );
    wait_for_members(&server, 0).await;
}

#[tokio::test]
async fn shutdown_closes_clients() {
    let (server, addr) = boot(ServerConfig::default()).await;
    let mut a = connect(addr).await;
    wait_for_members(&server, 1).await;

    let done = server
        .shutdown()
        .graceful_shutdown(Vec::new(), Some(TIMEOUT))
        .await;
    assert!(done);

    let outcome = next_message(&mut a).await;
    assert!(
        matches!(outcome, None | Some(Message::Close(_))),
        "unexpected {outcome:?}"
    );
    assert_eq!(server.shutdown().active_connections(), 0);
}

#[tokio::test]
async fn ping_endpoint_over_http() {
    let (_server, addr) = boot(ServerConfig::default()).await;
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/ping"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!({"message": "pong"}));
}

#[tokio::test]
async fn health_counts_live_connections() {
    let (server, addr) = boot(ServerConfig::default()).await;
    let _a = connect(addr).await;
    let _b = connect(addr).await;
    wait_for_members(&server, 2).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 2);
    assert_eq!(body["registrations"], 2);
}
