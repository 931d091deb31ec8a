//! Event types for the field client event system
//!
//! Provides the shared `AuditEvent` definitions and `EventBus` used to fan
//! events out to the SSE stream and any in-process subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::api::TechnicianInfo;
use crate::model::ModuleStatus;

/// Field client event types
///
/// Events are broadcast via `EventBus` and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// A module was mutated locally (user action on this device)
    ModuleUpdated {
        module_id: String,
        status: ModuleStatus,
        technician_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A remote update was accepted over local state
    ///
    /// Emitted with the originating technician so the UI can show who made
    /// the change when it was not this device.
    RemoteModuleUpdated {
        module_id: String,
        status: ModuleStatus,
        technician_id: String,
        technician_name: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Offline queue replay finished (possibly partially)
    QueueDrained {
        sent: usize,
        remaining: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The connectivity signal flipped
    ConnectivityChanged {
        online: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The set of technicians active on this audit changed
    TechniciansChanged {
        technicians: Vec<TechnicianInfo>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A liveness beacon failed to reach the Hub
    ///
    /// Never surfaced as a user-facing error; emitted so the failure is
    /// observable instead of silent.
    HeartbeatFailed {
        consecutive_failures: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for [`AuditEvent`]
///
/// Wraps `tokio::sync::broadcast`: subscribers receive events emitted after
/// subscription; slow subscribers lag and drop the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuditEvent>,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is normal (no UI connected) and not an error.
    pub fn emit(&self, event: AuditEvent) {
        match self.tx.send(event) {
            Ok(count) => tracing::debug!(subscribers = count, "Event emitted"),
            Err(_) => tracing::trace!("Event emitted with no subscribers"),
        }
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AuditEvent::ConnectivityChanged {
            online: false,
            timestamp: crate::time::now(),
        });

        match rx.recv().await.unwrap() {
            AuditEvent::ConnectivityChanged { online, .. } => assert!(!online),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(16);
        bus.emit(AuditEvent::QueueDrained {
            sent: 3,
            remaining: 0,
            timestamp: crate::time::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = AuditEvent::HeartbeatFailed {
            consecutive_failures: 2,
            timestamp: crate::time::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "HeartbeatFailed");
        assert_eq!(json["consecutive_failures"], 2);
    }
}
