use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::warn;

use moments_types::events::GatewayEvent;

/// A gateway event serialized once, shared by every connection it fans out to.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// `None` for events every connection receives.
    pub date: Option<NaiveDate>,
    pub json: Arc<str>,
}

/// Fans record and chat changes out to all connected clients.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. Connections filter by date.
    pub fn broadcast(&self, event: GatewayEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize gateway event: {}", e);
                return;
            }
        };
        // No receivers is fine: nobody is connected
        let _ = self.inner.broadcast_tx.send(BroadcastMessage {
            date: event.date(),
            json: json.into(),
        });
    }

    pub fn connection_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}
