//! The microgame loop and winner determination.
//!
//! Once launched, the scheduler ticks on a fixed period and alternates
//! between two phases, starting with [`Phase::Start`]:
//!
//! - **Start** -- broadcast the scripted `microgame-start` payload
//! - **Announce** -- broadcast a `display-text` message
//!
//! The loop has no stop condition; it runs until the process exits.
//!
//! Results arrive independently from the participants' read loops. The
//! first time the result table reaches the configured threshold, the
//! reporting task runs winner determination inline: `microgame-end` goes
//! to everyone, then after a short pause the winner alone is told. The
//! result table is never reset, so a process serves a single round.

use std::sync::Arc;

use microgame_types::{ServerMessage, SessionToken};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::dispatcher::{Dispatcher, encode};
use crate::registry::{Registry, ResultOutcome};
use crate::script::ScriptTable;

/// Scripted message type broadcast on start ticks.
pub const MICROGAME_START: &str = "microgame-start";

/// The two alternating scheduler phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Broadcast the scripted start payload.
    Start,
    /// Broadcast the announce text.
    Announce,
}

impl Phase {
    /// The phase that follows this one.
    pub const fn next(self) -> Self {
        match self {
            Self::Start => Self::Announce,
            Self::Announce => Self::Start,
        }
    }
}

/// Handle to the microgame loop and result aggregation. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MicrogameScheduler {
    registry: Registry,
    dispatcher: Dispatcher,
    scripts: Arc<ScriptTable>,
    config: GameConfig,
}

impl MicrogameScheduler {
    /// Create a scheduler. Nothing runs until [`launch`](Self::launch).
    pub const fn new(
        registry: Registry,
        dispatcher: Dispatcher,
        scripts: Arc<ScriptTable>,
        config: GameConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            scripts,
            config,
        }
    }

    /// Spawn the timed loop on a background task.
    ///
    /// Callers gate this behind [`Registry::begin_game`] so it happens once.
    pub fn launch(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    async fn run(self) {
        let period = self.config.tick_interval();
        info!(period_ms = self.config.tick_interval_ms, "Microgame loop started");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut phase = Phase::Start;

        loop {
            ticker.tick().await;
            if self.run_phase(phase) && phase == Phase::Start {
                info!("Started microgame");
            }
            phase = phase.next();
        }
    }

    /// Broadcast whatever `phase` calls for.
    ///
    /// Returns `true` if a frame was queued.
    pub fn run_phase(&self, phase: Phase) -> bool {
        let queued = match phase {
            Phase::Start => {
                let Some(payload) = self.scripts.get(MICROGAME_START) else {
                    warn!("No scripted microgame-start payload, skipping tick");
                    return false;
                };
                self.dispatcher.enqueue(payload)
            }
            Phase::Announce => self.dispatcher.enqueue_message(&ServerMessage::DisplayText {
                text: self.config.announce_text.clone(),
            }),
        };

        if queued {
            debug!(?phase, "Queued phase broadcast");
        } else {
            warn!(?phase, "Dispatcher stopped, phase broadcast dropped");
        }
        queued
    }

    /// Record one participant's result.
    ///
    /// Scores outside `0..=100` (or not finite) are discarded. When this
    /// result completes the round, winner determination runs before the
    /// call returns.
    pub async fn record_result(
        &self,
        token: SessionToken,
        percentage: f64,
    ) -> Option<ResultOutcome> {
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            warn!(%token, percentage, "Discarding out-of-range microgame result");
            return None;
        }

        let outcome = self
            .registry
            .record_result(token, percentage, self.config.result_threshold)
            .await;
        info!(%token, percentage, ?outcome, "Received microgame result");

        if matches!(outcome, ResultOutcome::ThresholdReached { .. }) {
            self.determine_winner().await;
        }
        Some(outcome)
    }

    /// Announce the end of the round and tell the winner.
    pub async fn determine_winner(&self) -> Option<(SessionToken, f64)> {
        if !self.dispatcher.enqueue_message(&ServerMessage::MicrogameEnd) {
            warn!("Dispatcher stopped, microgame-end not queued");
        }

        tokio::time::sleep(self.config.winner_pause()).await;

        let results = self.registry.results().await;
        let Some((winner, percentage)) = pick_winner(&results) else {
            warn!("Round ended with no results");
            return None;
        };

        let message = ServerMessage::DisplayText {
            text: self.config.winner_text.clone(),
        };
        if let Some(frame) = encode(&message) {
            let delivered = self.registry.send_to_token(winner, &frame).await;
            if delivered == 0 {
                warn!(%winner, "Winner is no longer connected");
            }
        }
        info!(%winner, percentage, "Winner determined");
        Some((winner, percentage))
    }
}

/// The entry with the strictly greatest percentage.
///
/// Ties go to the earliest entry, so with results in submission order the
/// first participant to reach the top score wins.
pub fn pick_winner(results: &[(SessionToken, f64)]) -> Option<(SessionToken, f64)> {
    results.iter().fold(None, |best, &(token, percentage)| match best {
        Some((_, top)) if percentage <= top => best,
        _ => Some((token, percentage)),
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::time::Duration;

    use microgame_types::{ConnectionId, IconCatalog};
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::Frame;

    const SCRIPT: &str =
        r#"{"type":"microgame-start","from":"server","time":5,"mask":[],"direction":"up"}"#;

    fn scheduler_with(scripts: ScriptTable) -> (Registry, MicrogameScheduler) {
        let registry = Registry::new(IconCatalog::default());
        let (dispatcher, _handle) = Dispatcher::spawn(registry.clone());
        let scheduler = MicrogameScheduler::new(
            registry.clone(),
            dispatcher,
            Arc::new(scripts),
            GameConfig::default(),
        );
        (registry, scheduler)
    }

    async fn join(
        registry: &Registry,
        token: SessionToken,
    ) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ConnectionId::new();
        registry.register(conn, tx).await;
        registry.set_validated(conn, token).await;
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(frame.as_str()).unwrap());
        }
        frames
    }

    #[test]
    fn phases_alternate() {
        assert_eq!(Phase::Start.next(), Phase::Announce);
        assert_eq!(Phase::Announce.next(), Phase::Start);
    }

    #[test]
    fn highest_score_wins() {
        let a = SessionToken::new();
        let b = SessionToken::new();
        let c = SessionToken::new();
        let winner = pick_winner(&[(a, 42.0), (b, 99.5), (c, 7.0)]);
        assert_eq!(winner.map(|(t, _)| t), Some(b));
    }

    #[test]
    fn ties_go_to_first_submission() {
        let a = SessionToken::new();
        let b = SessionToken::new();
        assert_eq!(pick_winner(&[(a, 50.0), (b, 50.0)]).map(|(t, _)| t), Some(a));
        assert_eq!(pick_winner(&[(a, 0.0), (b, 0.0)]).map(|(t, _)| t), Some(a));
        assert_eq!(pick_winner(&[]), None);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_alternates_start_and_announce() {
        let (registry, scheduler) = scheduler_with(ScriptTable::parse(SCRIPT).unwrap());
        let mut rx = join(&registry, SessionToken::new()).await;

        let _handle = scheduler.launch();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.as_str(), SCRIPT);

        tokio::time::sleep(Duration::from_millis(7000)).await;
        let second: Value = serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(second["type"], "display-text");
        assert_eq!(second["text"], "Test message");
        assert_eq!(second["from"], "server");

        tokio::time::sleep(Duration::from_millis(7000)).await;
        assert_eq!(rx.recv().await.unwrap().as_str(), SCRIPT);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_start_payload_skips_tick() {
        let (registry, scheduler) = scheduler_with(ScriptTable::default());
        let mut rx = join(&registry, SessionToken::new()).await;

        assert!(!scheduler.run_phase(Phase::Start));
        assert!(scheduler.run_phase(Phase::Announce));

        let only: Value = serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(only["type"], "display-text");
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn phase_reports_stopped_dispatcher() {
        let registry = Registry::new(IconCatalog::default());
        let (dispatcher, handle) = Dispatcher::spawn(registry.clone());
        let scheduler = MicrogameScheduler::new(
            registry,
            dispatcher,
            Arc::new(ScriptTable::parse(SCRIPT).unwrap()),
            GameConfig::default(),
        );
        assert!(scheduler.run_phase(Phase::Start));

        handle.abort();
        let _ = handle.await;
        assert!(!scheduler.run_phase(Phase::Start));
        assert!(!scheduler.run_phase(Phase::Announce));
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_winner_is_told() {
        let (registry, scheduler) = scheduler_with(ScriptTable::default());
        let a = SessionToken::new();
        let b = SessionToken::new();
        let c = SessionToken::new();
        let mut rx_a = join(&registry, a).await;
        let mut rx_b = join(&registry, b).await;
        let mut rx_c = join(&registry, c).await;

        scheduler.record_result(a, 42.0).await;
        scheduler.record_result(c, 7.0).await;
        let outcome = scheduler.record_result(b, 99.5).await;
        assert_eq!(outcome, Some(ResultOutcome::ThresholdReached { count: 3 }));
        tokio::task::yield_now().await;

        for rx in [&mut rx_a, &mut rx_c] {
            let frames = drain(rx);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames.first().unwrap()["type"], "microgame-end");
        }

        let frames = drain(&mut rx_b);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.first().unwrap()["type"], "microgame-end");
        assert_eq!(frames.last().unwrap()["type"], "display-text");
        assert_eq!(frames.last().unwrap()["text"], "You won!");
    }

    #[tokio::test(start_paused = true)]
    async fn determination_fires_once() {
        let (registry, scheduler) = scheduler_with(ScriptTable::default());
        let tokens: Vec<SessionToken> = (0..4).map(|_| SessionToken::new()).collect();
        let mut rx = join(&registry, SessionToken::new()).await;

        let mut reached = 0;
        for (i, token) in tokens.iter().enumerate() {
            let score = f64::from(u32::try_from(i).unwrap());
            if let Some(ResultOutcome::ThresholdReached { .. }) =
                scheduler.record_result(*token, score).await
            {
                reached += 1;
            }
        }
        // Resubmissions after the round is decided do not re-trigger.
        scheduler.record_result(tokens[0], 100.0).await;
        assert_eq!(reached, 1);

        tokio::task::yield_now().await;
        let ends = drain(&mut rx)
            .into_iter()
            .filter(|v| v["type"] == "microgame-end")
            .count();
        assert_eq!(ends, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_results_are_discarded() {
        let (registry, scheduler) = scheduler_with(ScriptTable::default());
        let token = SessionToken::new();
        assert_eq!(scheduler.record_result(token, f64::NAN).await, None);
        assert_eq!(scheduler.record_result(token, 100.5).await, None);
        assert_eq!(scheduler.record_result(token, -1.0).await, None);
        assert!(registry.results().await.is_empty());
        assert!(scheduler.record_result(token, 100.0).await.is_some());
    }
}
