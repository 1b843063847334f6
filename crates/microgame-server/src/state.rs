//! Shared application state for the coordinator.
//!
//! [`AppState`] wires the core components together around one
//! [`Registry`]. It is built once at startup, wrapped in [`Arc`], and
//! injected into every handler via Axum's `State` extractor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use microgame_types::IconCatalog;
use tokio::task::JoinHandle;

use crate::config::GameConfig;
use crate::dispatcher::Dispatcher;
use crate::icons::IconAllocator;
use crate::registry::Registry;
use crate::scheduler::MicrogameScheduler;
use crate::script::ScriptTable;
use crate::validator::SessionValidator;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection registry and all lock-guarded session state.
    pub registry: Registry,
    /// Producer handle for the broadcast queue.
    pub dispatcher: Dispatcher,
    /// Icon allocation.
    pub icons: IconAllocator,
    /// Name entry and game launch.
    pub validator: SessionValidator,
    /// Microgame loop and result aggregation.
    pub scheduler: MicrogameScheduler,
    /// Scripted server messages.
    pub scripts: Arc<ScriptTable>,
    /// Game settings.
    pub game: GameConfig,
    /// When this state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the state and start the broadcast dispatcher.
    ///
    /// Must be called from within a Tokio runtime. The returned handle
    /// belongs to the dispatcher task.
    pub fn new(
        catalog: IconCatalog,
        scripts: ScriptTable,
        game: GameConfig,
    ) -> (Self, JoinHandle<()>) {
        let registry = Registry::new(catalog);
        let (dispatcher, dispatcher_handle) = Dispatcher::spawn(registry.clone());
        let scripts = Arc::new(scripts);

        let icons = IconAllocator::new(registry.clone(), dispatcher.clone());
        let scheduler = MicrogameScheduler::new(
            registry.clone(),
            dispatcher.clone(),
            Arc::clone(&scripts),
            game.clone(),
        );
        let validator = SessionValidator::new(registry.clone(), scheduler.clone());

        let state = Self {
            registry,
            dispatcher,
            icons,
            validator,
            scheduler,
            scripts,
            game,
            started_at: Utc::now(),
        };
        (state, dispatcher_handle)
    }
}
