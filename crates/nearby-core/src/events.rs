//! Sighting event broadcast.
//!
//! Besides writing a log line, a session publishes every routed sighting
//! on a broadcast channel so that shells (and tests) can follow the
//! session live without parsing log output.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use nearby_types::{DeviceRecord, SightingOrigin};

/// One sighting after it has been applied to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingEvent {
    /// The stored record after the update.
    pub record: DeviceRecord,
    /// Whether this sighting created the record.
    pub is_new: bool,
    /// Which input channel produced the sighting.
    pub origin: SightingOrigin,
}

/// Sender for sighting events.
pub type EventSender = broadcast::Sender<SightingEvent>;

/// Receiver for sighting events.
pub type EventReceiver = broadcast::Receiver<SightingEvent>;

/// Event dispatcher for sending sightings to any number of receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SightingEvent) {
        // No receivers is fine
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
