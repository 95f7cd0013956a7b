//! Setup events for progress reporting.
//!
//! The provisioning wizard and the connection manager publish
//! [`SetupEvent`]s on a broadcast channel. A UI subscribes to render
//! progress; nothing in the wizard depends on anyone listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::provisioning::SetupStep;

/// Events emitted while provisioning a device.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SetupEvent {
    /// The wizard moved to another step.
    StepChanged { from: SetupStep, to: SetupStep },
    /// A matching device was found while scanning.
    Discovered {
        identifier: String,
        name: String,
        rssi: Option<i16>,
    },
    /// A connection attempt failed; another may follow.
    ConnectAttemptFailed {
        identifier: String,
        attempt: u32,
        reason: String,
    },
    /// Connected and services discovered.
    Connected { identifier: String, attempts: u32 },
    /// A command was written, or the write failed.
    CommandSent { command: String, delivered: bool },
    /// Values were written to the store.
    Persisted { keys: Vec<String> },
    /// The device was handed over to a Wi-Fi network.
    WifiHandoff { ssid: String },
    /// An operation failed; the step is unchanged.
    Failed { step: SetupStep, error: String },
}

/// Sender for setup events.
pub type EventSender = broadcast::Sender<SetupEvent>;

/// Receiver for setup events.
pub type EventReceiver = broadcast::Receiver<SetupEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SetupEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_receivers() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(SetupEvent::WifiHandoff {
            ssid: "HomeNet".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        dispatcher.send(SetupEvent::StepChanged {
            from: SetupStep::Scanning,
            to: SetupStep::Selecting,
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            SetupEvent::StepChanged {
                from: SetupStep::Scanning,
                to: SetupStep::Selecting
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = SetupEvent::Connected {
            identifier: "AA:BB".to_string(),
            attempts: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"attempts\":2"));
    }
}
