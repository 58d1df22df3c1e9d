//! Stream status types and the status notification bus
//!
//! The controller publishes exactly one current [`StreamStatus`] at a time.
//! Observers (the interactive front end, tests) subscribe through
//! [`StatusBus`], which wraps a `tokio::sync::watch` channel: subscribers
//! always read the latest value and never replay history.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle status of a generation session
///
/// Transitions are driven exclusively by the session controller. `Error`
/// and `Disconnected` are terminal for a controller instance; a fresh
/// controller is required to connect again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Initializing,
    Connecting,
    Connected,
    Playing,
    Paused,
    Error,
    Disconnected,
}

impl StreamStatus {
    /// Whether this status ends the controller's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamStatus::Error | StreamStatus::Disconnected)
    }

    /// Whether a live session exists in this status
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            StreamStatus::Connected | StreamStatus::Playing | StreamStatus::Paused
        )
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamStatus::Initializing => write!(f, "initializing"),
            StreamStatus::Connecting => write!(f, "connecting"),
            StreamStatus::Connected => write!(f, "connected"),
            StreamStatus::Playing => write!(f, "playing"),
            StreamStatus::Paused => write!(f, "paused"),
            StreamStatus::Error => write!(f, "error"),
            StreamStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Single-value status notification channel
///
/// Publishes the current [`StreamStatus`] to any number of observers.
/// Publishing never blocks and does not require subscribers; a subscriber
/// that misses intermediate transitions still observes the latest status,
/// which is the only value consumers want.
#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: watch::Sender<StreamStatus>,
}

impl StatusBus {
    /// Create a bus starting at [`StreamStatus::Initializing`]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StreamStatus::Initializing);
        Self { tx }
    }

    /// Publish a new current status
    ///
    /// Succeeds even when no subscriber is attached.
    pub fn publish(&self, status: StreamStatus) {
        self.tx.send_replace(status);
    }

    /// Subscribe to status updates
    ///
    /// The receiver immediately holds the current status.
    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.tx.subscribe()
    }

    /// Read the current status without subscribing
    pub fn current(&self) -> StreamStatus {
        *self.tx.borrow()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_initializing() {
        let bus = StatusBus::new();
        assert_eq!(bus.current(), StreamStatus::Initializing);

        let rx = bus.subscribe();
        assert_eq!(*rx.borrow(), StreamStatus::Initializing);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let bus = StatusBus::new();
        bus.publish(StreamStatus::Connecting);
        assert_eq!(bus.current(), StreamStatus::Connecting);
    }

    #[test]
    fn test_subscriber_sees_only_latest_value() {
        let bus = StatusBus::new();
        let rx = bus.subscribe();

        bus.publish(StreamStatus::Connecting);
        bus.publish(StreamStatus::Connected);
        bus.publish(StreamStatus::Playing);

        // Intermediate transitions are coalesced; only the current value
        // is observable.
        assert_eq!(*rx.borrow(), StreamStatus::Playing);
    }

    #[tokio::test]
    async fn test_subscriber_is_notified_of_changes() {
        let bus = StatusBus::new();
        let mut rx = bus.subscribe();

        bus.publish(StreamStatus::Connecting);
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow(), StreamStatus::Connecting);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(StreamStatus::Error.is_terminal());
        assert!(StreamStatus::Disconnected.is_terminal());
        assert!(!StreamStatus::Playing.is_terminal());
        assert!(!StreamStatus::Initializing.is_terminal());
    }

    #[test]
    fn test_connected_statuses() {
        assert!(StreamStatus::Connected.is_connected());
        assert!(StreamStatus::Playing.is_connected());
        assert!(StreamStatus::Paused.is_connected());
        assert!(!StreamStatus::Connecting.is_connected());
        assert!(!StreamStatus::Error.is_connected());
    }

    #[test]
    fn test_status_display_and_serde_agree() {
        let status = StreamStatus::Playing;
        assert_eq!(status.to_string(), "playing");
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"playing\"");

        let parsed: StreamStatus = serde_json::from_str("\"disconnected\"").unwrap();
        assert_eq!(parsed, StreamStatus::Disconnected);
    }
}
