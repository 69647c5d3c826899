//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::warn;

use signalhub_core::types::{ConnectionId, ParticipantId};

/// Why a frame could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The connection has been closed.
    Closed,
    /// The outbound buffer is full; the frame was dropped.
    Full,
}

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel for pushing text frames to the client,
/// plus metadata about the authenticated participant.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Participant who owns this connection
    pub participant_id: ParticipantId,
    /// Sender for outbound frames
    sender: mpsc::Sender<String>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Whether the connection is still alive
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(participant_id: ParticipantId, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            participant_id,
            sender,
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
        }
    }

    /// Queue a text frame without waiting.
    pub fn send(&self, frame: String) -> Result<(), SendFailure> {
        if !self.is_alive() {
            return Err(SendFailure::Closed);
        }
        match self.sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Connection send buffer full, dropping message");
                Err(SendFailure::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_closed();
                Err(SendFailure::Closed)
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.sender.is_closed()
    }

    /// Mark connection as closed
    pub fn mark_closed(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(buffer: usize) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            ConnectionHandle::new(ParticipantId::parse("alice").unwrap(), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn test_send_queues_frame() {
        let (handle, mut rx) = handle(4);
        handle.send("hello".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[test]
    fn test_full_buffer_drops_frame() {
        let (handle, _rx) = handle(1);
        handle.send("one".to_string()).unwrap();
        assert_eq!(handle.send("two".to_string()), Err(SendFailure::Full));
        assert!(handle.is_alive());
    }

    #[test]
    fn test_dropped_receiver_closes_handle() {
        let (handle, rx) = handle(1);
        drop(rx);
        assert_eq!(handle.send("x".to_string()), Err(SendFailure::Closed));
        assert!(!handle.is_alive());
    }
}
