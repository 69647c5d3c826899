//! Shared test helpers for API integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use signalhub_api::{AppState, build_state};
use signalhub_auth::JwtEncoder;
use signalhub_core::config::AppConfig;
use signalhub_store::StoreManager;
use signalhub_store::volatile::VolatileMembershipStore;

/// Test configuration: unpaced presence, fixed secret.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.presence.stage_delay_ms = 0;
    config.auth.jwt_secret = "test-secret".to_string();
    config.server.shutdown_grace_seconds = 1;
    config
}

/// State over a fresh volatile store.
pub fn test_state() -> AppState {
    let store = StoreManager::from_store(Arc::new(VolatileMembershipStore::new()));
    build_state(test_config(), &store)
}

/// Issue a token signed with the test secret.
pub fn token_for(participant: &str, name: Option<&str>) -> String {
    JwtEncoder::new(&test_config().auth)
        .issue(participant, name, None, chrono::Duration::minutes(5))
        .expect("token")
}

/// A server bound to an ephemeral port.
pub struct TestServer {
    /// Bound address.
    pub addr: SocketAddr,
    /// Shared state.
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start serving on 127.0.0.1:0.
    pub async fn start() -> Self {
        let state = test_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let serve_state = state.clone();
        let task = tokio::spawn(async move {
            signalhub_api::app::serve(listener, serve_state, async move {
                let _ = rx.await;
            })
            .await
            .expect("server");
        });

        Self {
            addr,
            state,
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    /// URL of the WebSocket endpoint carrying `token`.
    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// Open an authenticated WebSocket.
    pub async fn connect(&self, participant: &str) -> WsClient {
        self.connect_with_token(&token_for(participant, None)).await
    }

    /// Open a WebSocket with an explicit token.
    pub async fn connect_with_token(&self, token: &str) -> WsClient {
        let (stream, _) = tokio_tungstenite::connect_async(self.ws_url(token))
            .await
            .expect("websocket connect");
        WsClient { stream }
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("server stopped")
                .expect("server task");
        }
    }
}

/// A client WebSocket.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Send a JSON frame.
    pub async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("send");
    }

    /// Next JSON text frame, failing after two seconds.
    pub async fn next(&mut self) -> Value {
        loop {
            let message = tokio::time::timeout(Duration::from_secs(2), self.stream.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).expect("frame is JSON");
            }
        }
    }

    /// Skip frames until one of type `kind` arrives.
    pub async fn next_of(&mut self, kind: &str) -> Value {
        loop {
            let frame = self.next().await;
            if frame["type"] == kind {
                return frame;
            }
        }
    }

    /// Close the socket.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
