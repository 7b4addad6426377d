//! Shared harness: start the real router on a random port.

#![allow(dead_code)]

use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use dotdash_server::auth::credentials::{CredentialService, DEFAULT_CREDENTIAL_TTL};
use dotdash_server::config::{RateLimitConfig, WsConfig};
use dotdash_server::state::AppState;
use dotdash_server::store::{MemoryStore, SharedStore};
use dotdash_server::ws::ConnectionRegistry;

pub type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    pub connections: ConnectionRegistry,
    pub shutdown: CancellationToken,
    pub actors: TaskTracker,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Wait until the registry holds exactly `n` connections.
    pub async fn wait_for_connections(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.connections.len() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "Expected {} registered connections, found {}",
                n,
                self.connections.len()
            )
        });
    }
}

/// Options for [`start_server_with`].
pub struct ServerOptions {
    pub store: SharedStore,
    pub ttl: Duration,
    pub ws: WsConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            ttl: DEFAULT_CREDENTIAL_TTL,
            ws: WsConfig::default(),
            rate_limit: RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }
}

pub async fn start_test_server() -> TestServer {
    start_server_with(ServerOptions::default()).await
}

pub async fn start_server_with(options: ServerOptions) -> TestServer {
    let connections = ConnectionRegistry::new();
    let shutdown = CancellationToken::new();
    let actors = TaskTracker::new();

    let state = AppState {
        credentials: CredentialService::new(options.store, options.ttl),
        connections: connections.clone(),
        ws: options.ws,
        rate_limit: options.rate_limit,
        shutdown: shutdown.clone(),
        actors: actors.clone(),
    };

    let app = dotdash_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        connections,
        shutdown,
        actors,
    }
}

/// Register a device and return (device_uid, auth_token).
pub async fn register_device(base_url: &str) -> (String, String) {
    let resp = reqwest::get(format!("{}/register_device", base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "Device registration failed");

    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["device_uid"].as_str().unwrap().to_string(),
        body["auth_token"].as_str().unwrap().to_string(),
    )
}

pub async fn send_message(
    base_url: &str,
    device_uid: &str,
    auth_token: &str,
    symbol: serde_json::Value,
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/send_message", base_url))
        .json(&serde_json::json!({
            "auth": { "device_uid": device_uid, "auth_token": auth_token },
            "symbol": symbol,
        }))
        .send()
        .await
        .unwrap()
}

/// Read the next text frame as JSON, skipping keepalive pings.
pub async fn next_json(read: &mut WsRead) -> Option<serde_json::Value> {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(text.as_str()).unwrap())
            }
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

/// Assert nothing is delivered within `wait`.
pub async fn assert_silent(read: &mut WsRead, wait: Duration) {
    let result = tokio::time::timeout(wait, read.next()).await;
    assert!(result.is_err(), "Expected no message, got {:?}", result);
}
