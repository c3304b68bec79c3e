//! Best-effort room publishing.

use cottage_ipc::RoomEvent;
use tokio::sync::broadcast;
use tracing::trace;

pub trait RoomChannel: Send {
    /// Never blocks and never reports failure; nobody listening is fine.
    fn publish(&self, room_id: &str, event: &str, payload: serde_json::Value);
}

pub struct NullRoom;

impl RoomChannel for NullRoom {
    fn publish(&self, _room_id: &str, _event: &str, _payload: serde_json::Value) {}
}

/// Fans events out to every IPC subscriber.
#[derive(Clone)]
pub struct BroadcastRoom {
    tx: broadcast::Sender<RoomEvent>,
}

impl BroadcastRoom {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }
}

impl RoomChannel for BroadcastRoom {
    fn publish(&self, room_id: &str, event: &str, payload: serde_json::Value) {
        let event = RoomEvent {
            room_id: room_id.to_string(),
            event: event.to_string(),
            payload,
        };
        // An error only means there are no subscribers right now.
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(room_id, delivered, "room event published");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct RecordingRoom {
        events: Arc<Mutex<Vec<RoomEvent>>>,
    }

    impl RecordingRoom {
        pub fn events(&self) -> Vec<RoomEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RoomChannel for RecordingRoom {
        fn publish(&self, room_id: &str, event: &str, payload: serde_json::Value) {
            self.events.lock().unwrap().push(RoomEvent {
                room_id: room_id.to_string(),
                event: event.to_string(),
                payload,
            });
        }
    }
}
