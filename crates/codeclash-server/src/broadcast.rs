use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use codeclash_core::net::messages::ServerMessage;
use codeclash_core::net::protocol::encode_server_message;

/// Per-subscriber sender for outbound binary messages. Bounded so slow
/// subscribers drop messages instead of stalling the session.
/// Uses `Bytes` for zero-copy cloning across subscriber channels.
pub type SubscriberSender = mpsc::Sender<Bytes>;

/// Fan-out channel for one room. Messages are encoded once and cloned
/// cheaply per subscriber.
pub struct Broadcaster {
    subscribers: Mutex<HashMap<Uuid, SubscriberSender>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, user_id: Uuid, sender: SubscriberSender) {
        self.subscribers.lock().unwrap().insert(user_id, sender);
    }

    pub fn unsubscribe(&self, user_id: &Uuid) {
        self.subscribers.lock().unwrap().remove(user_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Encode and push a message to every subscriber.
    pub fn broadcast(&self, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.broadcast_bytes(Bytes::from(data)),
            Err(e) => tracing::error!(error = %e, "Failed to encode broadcast message"),
        }
    }

    /// Push pre-encoded bytes to every subscriber.
    pub fn broadcast_bytes(&self, bytes: Bytes) {
        let subscribers = self.subscribers.lock().unwrap();
        for (uid, sender) in subscribers.iter() {
            if let Err(e) = sender.try_send(bytes.clone()) {
                tracing::debug!(
                    user_id = %uid, error = %e,
                    "Skipping broadcast to slow subscriber"
                );
            }
        }
    }

    /// Encode and push a message to a single subscriber.
    pub fn send_to(&self, user_id: &Uuid, msg: &ServerMessage) {
        let data = match encode_server_message(msg) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode direct message");
                return;
            },
        };
        let subscribers = self.subscribers.lock().unwrap();
        if let Some(sender) = subscribers.get(user_id)
            && let Err(e) = sender.try_send(data)
        {
            tracing::debug!(
                user_id = %user_id, error = %e,
                "Failed to send to subscriber (slow or disconnected)"
            );
        }
    }
}
