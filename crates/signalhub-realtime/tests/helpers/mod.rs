//! Shared helpers for signaling engine tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use signalhub_auth::InMemoryProfileDirectory;
use signalhub_core::config::AppConfig;
use signalhub_core::traits::MembershipStore;
use signalhub_core::types::ParticipantId;
use signalhub_realtime::SignalingEngine;
use signalhub_realtime::connection::ConnectionHandle;
use signalhub_store::volatile::VolatileMembershipStore;

/// Engine under test plus the store behind it.
pub struct TestEngine {
    /// The engine.
    pub engine: SignalingEngine,
    /// Direct store access for arranging state.
    pub store: Arc<dyn MembershipStore>,
    /// Profile directory shared with the engine.
    pub profiles: Arc<InMemoryProfileDirectory>,
}

impl TestEngine {
    /// Engine over a fresh volatile store with presence pacing disabled.
    pub fn new() -> Self {
        Self::with_store(Arc::new(VolatileMembershipStore::new()), test_config())
    }

    /// Engine over an arbitrary store.
    pub fn with_store(store: Arc<dyn MembershipStore>, config: AppConfig) -> Self {
        let profiles = Arc::new(InMemoryProfileDirectory::new());
        let engine = SignalingEngine::new(&config, store.clone(), profiles.clone());
        Self {
            engine,
            store,
            profiles,
        }
    }

    /// Attach an authenticated client.
    pub fn connect(&self, participant: &str) -> TestClient {
        let participant_id = ParticipantId::parse(participant).expect("participant id");
        let (handle, rx) = self.engine.connections.register(participant_id);
        TestClient {
            engine: self.engine.clone(),
            handle,
            rx,
        }
    }
}

/// Configuration with no presence pacing.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.presence.stage_delay_ms = 0;
    config
}

/// A registered connection and its outbound queue.
pub struct TestClient {
    engine: SignalingEngine,
    /// Connection handle.
    pub handle: Arc<ConnectionHandle>,
    /// Frames queued for this connection.
    pub rx: mpsc::Receiver<String>,
}

impl TestClient {
    /// Submit a raw inbound frame.
    pub async fn send(&self, frame: Value) {
        self.engine
            .connections
            .handle_inbound(&self.handle.id, &frame.to_string())
            .await;
    }

    /// Submit a frame verbatim.
    pub async fn send_raw(&self, frame: &str) {
        self.engine
            .connections
            .handle_inbound(&self.handle.id, frame)
            .await;
    }

    /// Submit a `join-room` for this client's own identity.
    pub async fn join(&self, room: &str) {
        self.send(serde_json::json!({
            "type": "join-room",
            "room": room,
            "participantId": self.handle.participant_id.as_str(),
        }))
        .await;
    }

    /// Next outbound frame, failing after one second.
    pub async fn next(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection queue closed");
        serde_json::from_str(&frame).expect("frame is JSON")
    }

    /// Next outbound frame's `type`.
    pub async fn next_type(&mut self) -> String {
        self.next().await["type"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// Everything queued after a short settle period.
    pub async fn drain(&mut self) -> Vec<Value> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&frame).expect("frame is JSON"));
        }
        frames
    }

    /// Drain and return only the frame types.
    pub async fn drain_types(&mut self) -> Vec<String> {
        self.drain()
            .await
            .into_iter()
            .map(|f| f["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}
