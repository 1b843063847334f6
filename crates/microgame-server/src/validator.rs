//! Name entry: token issue and the one-time game launch.

use microgame_types::{ConnectionId, ServerMessage, SessionToken};
use tracing::{debug, info};

use crate::dispatcher::encode;
use crate::registry::Registry;
use crate::scheduler::MicrogameScheduler;

/// Issues session tokens and starts the microgame loop on first use.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    registry: Registry,
    scheduler: MicrogameScheduler,
}

impl SessionValidator {
    /// Create a validator that launches `scheduler` on first validation.
    pub const fn new(registry: Registry, scheduler: MicrogameScheduler) -> Self {
        Self {
            registry,
            scheduler,
        }
    }

    /// Validate `conn` and return its new token.
    ///
    /// The token is sent to `conn` alone. If no game is running yet, this
    /// call launches the microgame loop; concurrent callers race on the
    /// registry latch and exactly one of them wins.
    pub async fn validate(&self, conn: ConnectionId) -> SessionToken {
        let token = SessionToken::new();

        if let Some(frame) = encode(&ServerMessage::NameValidation { guid: token }) {
            if self.registry.send_to(conn, frame).await {
                debug!(%conn, "Sent name-validation");
            }
        }

        if !self.registry.set_validated(conn, token).await {
            debug!(%conn, "Validated connection is no longer registered");
        }
        info!(%conn, %token, "Participant validated");

        if self.registry.begin_game().await {
            info!("First participant validated, launching microgame loop");
            // Detached: the loop has no stop condition.
            drop(self.scheduler.launch());
        }

        token
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use microgame_types::IconCatalog;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::GameConfig;
    use crate::dispatcher::Dispatcher;
    use crate::registry::Frame;
    use crate::script::ScriptTable;

    const START: &str =
        r#"{"type":"microgame-start","from":"server","time":5,"mask":[],"direction":"left"}"#;

    fn validator_with(scripts: ScriptTable) -> (Registry, SessionValidator) {
        let registry = Registry::new(IconCatalog::default());
        let (dispatcher, _handle) = Dispatcher::spawn(registry.clone());
        let scheduler = MicrogameScheduler::new(
            registry.clone(),
            dispatcher,
            Arc::new(scripts),
            GameConfig::default(),
        );
        (registry.clone(), SessionValidator::new(registry, scheduler))
    }

    fn validator() -> (Registry, SessionValidator) {
        validator_with(ScriptTable::default())
    }

    fn count_starts(rx: &mut mpsc::UnboundedReceiver<Frame>) -> usize {
        std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|frame| frame.as_str() == START)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_sent_to_requester_and_recorded() {
        let (registry, validator) = validator();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        registry.register(conn, tx).await;

        let token = validator.validate(conn).await;

        let reply: Value = serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(reply["type"], "name-validation");
        assert_eq!(reply["from"], "server");
        assert_eq!(reply["guid"], token.to_string());

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.first().unwrap().1.token, Some(token));
        assert!(registry.game_started().await);
    }

    #[tokio::test(start_paused = true)]
    async fn each_validation_gets_a_fresh_token() {
        let (registry, validator) = validator();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        registry.register(conn, tx).await;

        let first = validator.validate(conn).await;
        let second = validator.validate(conn).await;
        assert_ne!(first, second);
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.first().unwrap().1.token, Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_validations_launch_once() {
        let (registry, validator) = validator();
        let mut conns = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..8 {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = ConnectionId::new();
            registry.register(conn, tx).await;
            conns.push(conn);
            receivers.push(rx);
        }

        let handles: Vec<_> = conns
            .into_iter()
            .map(|conn| {
                let validator = validator.clone();
                tokio::spawn(async move { validator.validate(conn).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(registry.game_started().await);
        assert!(!registry.begin_game().await);
        assert_eq!(registry.stats().await.validated, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_validations_start_one_loop() {
        let (registry, validator) = validator_with(ScriptTable::parse(START).unwrap());
        let mut conns = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..8 {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = ConnectionId::new();
            registry.register(conn, tx).await;
            conns.push(conn);
            receivers.push(rx);
        }

        let handles: Vec<_> = conns
            .into_iter()
            .map(|conn| {
                let validator = validator.clone();
                tokio::spawn(async move { validator.validate(conn).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // The first tick fires at once; stay well inside the 7 s period.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        for rx in &mut receivers {
            assert_eq!(count_starts(rx), 1);
        }

        tokio::time::sleep(Duration::from_millis(3000)).await;
        for rx in &mut receivers {
            assert_eq!(count_starts(rx), 0);
        }
    }
}
