//! Connection registry and the lock-guarded session state.
//!
//! [`Registry`] owns every piece of shared mutable state in the
//! coordinator: the per-connection client records, the microgame result
//! table, and the two one-shot latches (game launched, round decided).
//! All of it sits behind a single [`Mutex`]; each method takes the lock
//! once, mutates or copies out, and releases it before returning.
//!
//! Writing to a connection never blocks: each client record holds the
//! sending half of an unbounded channel drained by that connection's
//! writer task. A closed channel means the writer is gone, so the
//! connection is treated as dead.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use microgame_types::{ConnectionId, IconCatalog, SessionToken};
use tokio::sync::{Mutex, mpsc};

/// A fully serialized outbound text frame.
pub type Frame = Utf8Bytes;

/// Sending half of a connection's outbound frame queue.
pub type Outbound = mpsc::UnboundedSender<Frame>;

/// Per-connection record.
///
/// A client is validated exactly when it holds a token.
#[derive(Debug)]
struct Client {
    outbound: Outbound,
    icon: Option<String>,
    token: Option<SessionToken>,
}

impl Client {
    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            icon: self.icon.clone(),
            token: self.token,
        }
    }
}

/// Read-only copy of a client's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    /// Icon currently held, if any.
    pub icon: Option<String>,
    /// Token issued on name entry, if validated.
    pub token: Option<SessionToken>,
}

impl ClientSnapshot {
    /// Whether the client has submitted a name and holds a token.
    pub const fn validated(&self) -> bool {
        self.token.is_some()
    }
}

/// Outcome of recording one microgame result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    /// The result was stored; the round is still open or already decided.
    Recorded {
        /// Number of distinct tokens with a result.
        count: usize,
    },
    /// This result brought the table to the threshold for the first time.
    /// The caller must run winner determination.
    ThresholdReached {
        /// Number of distinct tokens with a result.
        count: usize,
    },
}

/// Counters exposed on the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SessionStats {
    /// Registered connections.
    pub connected: usize,
    /// Registered connections holding a token.
    pub validated: usize,
    /// Distinct tokens with a recorded result.
    pub results: usize,
    /// Whether the microgame loop has been launched.
    pub game_started: bool,
    /// Whether the winner of the round has been determined.
    pub round_decided: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    clients: HashMap<ConnectionId, Client>,
    /// Results in first-submission order. A resubmission overwrites the
    /// score in place.
    results: Vec<(SessionToken, f64)>,
    game_started: bool,
    round_decided: bool,
}

/// Shared handle to the session state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Registry {
    state: Arc<Mutex<SessionState>>,
    catalog: Arc<IconCatalog>,
}

impl Registry {
    /// Create an empty registry over a fixed icon catalog.
    pub fn new(catalog: IconCatalog) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            catalog: Arc::new(catalog),
        }
    }

    /// The icon catalog this registry allocates from.
    pub fn catalog(&self) -> &IconCatalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add a connection with empty state.
    pub async fn register(&self, conn: ConnectionId, outbound: Outbound) {
        let mut state = self.state.lock().await;
        state.clients.insert(
            conn,
            Client {
                outbound,
                icon: None,
                token: None,
            },
        );
    }

    /// Remove a connection and everything recorded for it.
    ///
    /// Returns `false` if the connection was already gone (for example
    /// evicted by the dispatcher after a failed write). Dropping the record
    /// drops the outbound sender, which shuts the writer task down.
    pub async fn unregister(&self, conn: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        state.clients.remove(&conn).is_some()
    }

    /// Copy out every live connection and its metadata.
    pub async fn snapshot(&self) -> Vec<(ConnectionId, ClientSnapshot)> {
        let state = self.state.lock().await;
        state
            .clients
            .iter()
            .map(|(conn, client)| (*conn, client.snapshot()))
            .collect()
    }

    /// Current counters for the status endpoint.
    pub async fn stats(&self) -> SessionStats {
        let state = self.state.lock().await;
        SessionStats {
            connected: state.clients.len(),
            validated: state
                .clients
                .values()
                .filter(|client| client.token.is_some())
                .count(),
            results: state.results.len(),
            game_started: state.game_started,
            round_decided: state.round_decided,
        }
    }

    // -----------------------------------------------------------------------
    // Icons
    // -----------------------------------------------------------------------

    /// Assign `icon` to `conn` unless another live connection holds it.
    ///
    /// Reselecting the icon `conn` already holds succeeds. Returns `false`
    /// when the icon is taken or `conn` is not registered.
    pub async fn set_icon(&self, conn: ConnectionId, icon: &str) -> bool {
        let mut state = self.state.lock().await;
        let taken = state
            .clients
            .iter()
            .any(|(other, client)| *other != conn && client.icon.as_deref() == Some(icon));
        if taken {
            return false;
        }
        match state.clients.get_mut(&conn) {
            Some(client) => {
                client.icon = Some(icon.to_owned());
                true
            }
            None => false,
        }
    }

    /// Icon currently held by `conn`.
    pub async fn icon_of(&self, conn: ConnectionId) -> Option<String> {
        let state = self.state.lock().await;
        state.clients.get(&conn).and_then(|client| client.icon.clone())
    }

    /// Catalog icons not held by any live connection, in catalog order.
    pub async fn available_icons(&self) -> Vec<String> {
        let state = self.state.lock().await;
        self.catalog
            .iter()
            .filter(|icon| {
                !state
                    .clients
                    .values()
                    .any(|client| client.icon.as_deref() == Some(*icon))
            })
            .map(str::to_owned)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Validation and game lifecycle
    // -----------------------------------------------------------------------

    /// Mark `conn` validated with `token`, replacing any earlier token.
    ///
    /// Returns `false` if `conn` is not registered.
    pub async fn set_validated(&self, conn: ConnectionId, token: SessionToken) -> bool {
        let mut state = self.state.lock().await;
        match state.clients.get_mut(&conn) {
            Some(client) => {
                client.token = Some(token);
                true
            }
            None => false,
        }
    }

    /// Flip the game-launched latch.
    ///
    /// Returns `true` for exactly one caller over the life of the registry;
    /// that caller is responsible for starting the microgame loop.
    pub async fn begin_game(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.game_started {
            return false;
        }
        state.game_started = true;
        true
    }

    /// Whether the microgame loop has been launched.
    pub async fn game_started(&self) -> bool {
        self.state.lock().await.game_started
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Store a result and report whether it completed the round.
    ///
    /// [`ResultOutcome::ThresholdReached`] is returned at most once per
    /// registry, the first time the number of distinct tokens reaches
    /// `threshold`.
    pub async fn record_result(
        &self,
        token: SessionToken,
        percentage: f64,
        threshold: usize,
    ) -> ResultOutcome {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.results.iter_mut().find(|(t, _)| *t == token) {
            entry.1 = percentage;
        } else {
            state.results.push((token, percentage));
        }
        let count = state.results.len();
        if !state.round_decided && count >= threshold {
            state.round_decided = true;
            ResultOutcome::ThresholdReached { count }
        } else {
            ResultOutcome::Recorded { count }
        }
    }

    /// Copy of the result table in first-submission order.
    pub async fn results(&self) -> Vec<(SessionToken, f64)> {
        self.state.lock().await.results.clone()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Queue `frame` on one connection.
    ///
    /// Returns `false` if the connection is unknown or its writer has gone
    /// away. The connection's own read loop is left to clean it up.
    pub async fn send_to(&self, conn: ConnectionId, frame: Frame) -> bool {
        let state = self.state.lock().await;
        state
            .clients
            .get(&conn)
            .is_some_and(|client| client.outbound.send(frame).is_ok())
    }

    /// Queue `frame` on every connection holding `token`.
    ///
    /// Returns how many connections accepted it.
    pub async fn send_to_token(&self, token: SessionToken, frame: &Frame) -> usize {
        let state = self.state.lock().await;
        state
            .clients
            .values()
            .filter(|client| client.token == Some(token))
            .filter(|client| client.outbound.send(frame.clone()).is_ok())
            .count()
    }

    /// Queue `frame` on every live connection, evicting any whose writer is
    /// gone. Returns the evicted connections.
    pub async fn broadcast(&self, frame: &Frame) -> Vec<ConnectionId> {
        let mut state = self.state.lock().await;
        let dead: Vec<ConnectionId> = state
            .clients
            .iter()
            .filter(|(_, client)| client.outbound.send(frame.clone()).is_err())
            .map(|(conn, _)| *conn)
            .collect();
        for conn in &dead {
            state.clients.remove(conn);
        }
        dead
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn connect() -> (ConnectionId, Outbound, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionId::new(), tx, rx)
    }

    #[tokio::test]
    async fn register_and_unregister_once() {
        let registry = Registry::new(IconCatalog::default());
        let (conn, tx, _rx) = connect();
        registry.register(conn, tx).await;
        assert_eq!(registry.stats().await.connected, 1);
        assert!(registry.unregister(conn).await);
        assert!(!registry.unregister(conn).await);
        assert_eq!(registry.stats().await.connected, 0);
    }

    #[tokio::test]
    async fn icons_are_exclusive() {
        let registry = Registry::new(IconCatalog::default());
        let (a, tx_a, _rx_a) = connect();
        let (b, tx_b, _rx_b) = connect();
        registry.register(a, tx_a).await;
        registry.register(b, tx_b).await;

        assert!(registry.set_icon(a, "frog").await);
        assert!(!registry.set_icon(b, "frog").await);
        assert_eq!(registry.icon_of(b).await, None);

        // Reselecting one's own icon is not a conflict.
        assert!(registry.set_icon(a, "frog").await);
    }

    #[tokio::test]
    async fn switching_icons_releases_the_old_one() {
        let registry = Registry::new(IconCatalog::default());
        let (a, tx_a, _rx_a) = connect();
        registry.register(a, tx_a).await;

        assert!(registry.set_icon(a, "ava").await);
        assert!(!registry.available_icons().await.contains(&String::from("ava")));
        assert!(registry.set_icon(a, "zoe").await);
        let available = registry.available_icons().await;
        assert!(available.contains(&String::from("ava")));
        assert!(!available.contains(&String::from("zoe")));
    }

    #[tokio::test]
    async fn unregister_frees_icon() {
        let registry = Registry::new(IconCatalog::default());
        let (a, tx_a, _rx_a) = connect();
        registry.register(a, tx_a).await;
        registry.set_icon(a, "void").await;
        assert_eq!(registry.available_icons().await.len(), 8);
        registry.unregister(a).await;
        assert_eq!(registry.available_icons().await.len(), 9);
    }

    #[tokio::test]
    async fn unregistered_connection_cannot_claim() {
        let registry = Registry::new(IconCatalog::default());
        assert!(!registry.set_icon(ConnectionId::new(), "ava").await);
        assert!(
            !registry
                .set_validated(ConnectionId::new(), SessionToken::new())
                .await
        );
    }

    #[tokio::test]
    async fn validation_sets_token() {
        let registry = Registry::new(IconCatalog::default());
        let (a, tx_a, _rx_a) = connect();
        registry.register(a, tx_a).await;
        let token = SessionToken::new();
        assert!(registry.set_validated(a, token).await);

        let snapshot = registry.snapshot().await;
        let (_, client) = snapshot.first().unwrap();
        assert!(client.validated());
        assert_eq!(client.token, Some(token));
        assert_eq!(registry.stats().await.validated, 1);
    }

    #[tokio::test]
    async fn begin_game_latches_once() {
        let registry = Registry::new(IconCatalog::default());
        assert!(!registry.game_started().await);
        assert!(registry.begin_game().await);
        assert!(!registry.begin_game().await);
        assert!(registry.game_started().await);
    }

    #[tokio::test]
    async fn threshold_fires_once() {
        let registry = Registry::new(IconCatalog::default());
        let a = SessionToken::new();
        let b = SessionToken::new();
        let c = SessionToken::new();

        assert_eq!(
            registry.record_result(a, 10.0, 3).await,
            ResultOutcome::Recorded { count: 1 }
        );
        assert_eq!(
            registry.record_result(b, 20.0, 3).await,
            ResultOutcome::Recorded { count: 2 }
        );
        // Resubmission does not grow the table.
        assert_eq!(
            registry.record_result(a, 15.0, 3).await,
            ResultOutcome::Recorded { count: 2 }
        );
        assert_eq!(
            registry.record_result(c, 30.0, 3).await,
            ResultOutcome::ThresholdReached { count: 3 }
        );
        assert_eq!(
            registry.record_result(c, 35.0, 3).await,
            ResultOutcome::Recorded { count: 3 }
        );
        assert_eq!(
            registry.record_result(SessionToken::new(), 1.0, 3).await,
            ResultOutcome::Recorded { count: 4 }
        );

        let results = registry.results().await;
        assert_eq!(results.first().map(|(t, _)| *t), Some(a));
        assert!(results.first().is_some_and(|(_, p)| (*p - 15.0).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn broadcast_evicts_dead_connections() {
        let registry = Registry::new(IconCatalog::default());
        let (alive, tx_alive, mut rx_alive) = connect();
        let (dead, tx_dead, rx_dead) = connect();
        registry.register(alive, tx_alive).await;
        registry.register(dead, tx_dead).await;
        registry.set_icon(dead, "potat").await;
        drop(rx_dead);

        let evicted = registry.broadcast(&Frame::from("hello")).await;
        assert_eq!(evicted, vec![dead]);
        assert_eq!(rx_alive.recv().await.unwrap().as_str(), "hello");
        assert_eq!(registry.stats().await.connected, 1);
        assert!(registry.available_icons().await.contains(&String::from("potat")));
    }

    #[tokio::test]
    async fn send_to_token_targets_only_holder() {
        let registry = Registry::new(IconCatalog::default());
        let (a, tx_a, mut rx_a) = connect();
        let (b, tx_b, mut rx_b) = connect();
        registry.register(a, tx_a).await;
        registry.register(b, tx_b).await;
        let token = SessionToken::new();
        registry.set_validated(a, token).await;

        assert_eq!(registry.send_to_token(token, &Frame::from("won")).await, 1);
        assert_eq!(rx_a.recv().await.unwrap().as_str(), "won");
        assert!(rx_b.try_recv().is_err());
        assert!(registry.send_to(b, Frame::from("direct")).await);
        assert_eq!(rx_b.recv().await.unwrap().as_str(), "direct");
    }
}
