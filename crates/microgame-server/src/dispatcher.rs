//! Broadcast dispatcher: the single writer for "everyone" messages.
//!
//! Producers push fully serialized frames onto an unbounded queue; one
//! consumer task pops them in order and fans each out to every registered
//! connection through [`Registry::broadcast`]. Because there is only one
//! consumer, all broadcasts reach every connection in enqueue order.
//!
//! The icon list is the one message built by the consumer rather than the
//! producer: [`Dispatcher::enqueue_icons_available`] queues a marker and the
//! list is read from the registry when its turn comes, so the last list a
//! client receives always reflects the registry at that point.
//!
//! A connection whose writer is gone is evicted during the fan-out. Its
//! icon is free from that moment, so the consumer follows up with a fresh
//! `icons-available` list before taking the next queued item.

use microgame_types::ServerMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::{Frame, Registry};

/// One entry in the broadcast queue.
#[derive(Debug, Clone)]
enum Outgoing {
    Frame(Frame),
    IconsAvailable,
}

/// Producer handle for the broadcast queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Dispatcher {
    /// Start the consumer task and return a producer handle.
    ///
    /// The task runs until every [`Dispatcher`] clone has been dropped.
    pub fn spawn(registry: Registry) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_dispatcher(rx, registry));
        (Self { tx }, handle)
    }

    /// Queue a pre-serialized frame for every connection.
    ///
    /// Returns `false` only if the consumer task has stopped.
    pub fn enqueue(&self, frame: impl Into<Frame>) -> bool {
        self.tx.send(Outgoing::Frame(frame.into())).is_ok()
    }

    /// Queue the current `icons-available` list for every connection.
    ///
    /// The list is computed when the consumer reaches this entry.
    pub fn enqueue_icons_available(&self) -> bool {
        self.tx.send(Outgoing::IconsAvailable).is_ok()
    }

    /// Serialize `message` and queue it for every connection.
    pub fn enqueue_message(&self, message: &ServerMessage) -> bool {
        encode(message).is_some_and(|frame| self.enqueue(frame))
    }
}

/// Serialize a server message into a socket frame, logging on failure.
pub fn encode(message: &ServerMessage) -> Option<Frame> {
    match message.to_frame() {
        Ok(text) => Some(Frame::from(text)),
        Err(e) => {
            warn!(error = %e, ?message, "Failed to serialize server message");
            None
        }
    }
}

async fn icons_frame(registry: &Registry) -> Option<Frame> {
    let icons = registry.available_icons().await;
    debug!(?icons, "Broadcasting available icons");
    encode(&ServerMessage::IconsAvailable { icons })
}

async fn run_dispatcher(mut rx: mpsc::UnboundedReceiver<Outgoing>, registry: Registry) {
    debug!("Broadcast dispatcher started");

    while let Some(item) = rx.recv().await {
        let frame = match item {
            Outgoing::Frame(frame) => frame,
            Outgoing::IconsAvailable => match icons_frame(&registry).await {
                Some(frame) => frame,
                None => continue,
            },
        };
        let mut evicted = registry.broadcast(&frame).await;

        // Each eviction frees an icon; keep announcing until a fan-out
        // completes without losing anyone.
        while !evicted.is_empty() {
            for conn in &evicted {
                warn!(%conn, "Write failed, connection evicted");
            }
            let Some(update) = icons_frame(&registry).await else {
                break;
            };
            evicted = registry.broadcast(&update).await;
        }
    }

    info!("Broadcast dispatcher stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use microgame_types::{ConnectionId, IconCatalog};

    use super::*;

    #[tokio::test]
    async fn delivers_in_enqueue_order_to_everyone() {
        let registry = Registry::new(IconCatalog::default());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(ConnectionId::new(), tx_a).await;
        registry.register(ConnectionId::new(), tx_b).await;

        let (dispatcher, _handle) = Dispatcher::spawn(registry);
        assert!(dispatcher.enqueue("one"));
        assert!(dispatcher.enqueue(String::from("two")));

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.recv().await.unwrap().as_str(), "one");
            assert_eq!(rx.recv().await.unwrap().as_str(), "two");
        }
    }

    #[tokio::test]
    async fn eviction_triggers_icon_update() {
        let registry = Registry::new(IconCatalog::default());
        let (tx_alive, mut rx_alive) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let dead = ConnectionId::new();
        registry.register(ConnectionId::new(), tx_alive).await;
        registry.register(dead, tx_dead).await;
        assert!(registry.set_icon(dead, "cubert").await);
        drop(rx_dead);

        let (dispatcher, _handle) = Dispatcher::spawn(registry.clone());
        dispatcher.enqueue_message(&ServerMessage::MicrogameEnd);

        let first: serde_json::Value =
            serde_json::from_str(rx_alive.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(first["type"], "microgame-end");

        let second: serde_json::Value =
            serde_json::from_str(rx_alive.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(second["type"], "icons-available");
        assert_eq!(second["icons"].as_array().unwrap().len(), 9);
        assert_eq!(registry.stats().await.connected, 1);
    }

    #[tokio::test]
    async fn icon_list_is_read_when_sent() {
        let registry = Registry::new(IconCatalog::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        registry.register(conn, tx).await;

        let (dispatcher, handle) = Dispatcher::spawn(registry.clone());
        // Both markers are queued before the claim lands.
        assert!(dispatcher.enqueue_icons_available());
        assert!(dispatcher.enqueue_icons_available());
        assert!(registry.set_icon(conn, "eepy").await);
        drop(dispatcher);
        handle.await.unwrap();

        for _ in 0..2 {
            let update: serde_json::Value =
                serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
            assert_eq!(update["icons"].as_array().unwrap().len(), 8);
        }
    }

    #[tokio::test]
    async fn enqueue_reports_a_stopped_consumer() {
        let registry = Registry::new(IconCatalog::default());
        let (dispatcher, handle) = Dispatcher::spawn(registry);
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        assert!(!dispatcher.enqueue("late"));
        assert!(!dispatcher.enqueue_icons_available());
        assert!(!dispatcher.enqueue_message(&ServerMessage::MicrogameEnd));
    }
}
