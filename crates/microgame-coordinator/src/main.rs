//! Coordinator binary for the microgame party game.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `microgame-config.yaml` (optional)
//! 3. Load the protocol script (fatal if missing or malformed)
//! 4. Build shared state and start the broadcast dispatcher
//! 5. Start the operator console on stdin
//! 6. Serve the game socket until the listener fails

mod error;

use std::sync::Arc;

use microgame_server::console::run_console;
use microgame_server::{AppState, CoordinatorConfig, ScriptTable, start_server};
use microgame_types::IconCatalog;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::CoordinatorError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the protocol script, or the
/// listener fails.
#[tokio::main]
async fn main() -> Result<(), CoordinatorError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("microgame-coordinator starting");

    // 2. Load configuration.
    let config = CoordinatorConfig::load()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        tick_interval_ms = config.game.tick_interval_ms,
        result_threshold = config.game.result_threshold,
        script = %config.script.path.display(),
        "Configuration loaded"
    );

    // 3. Load the protocol script.
    let scripts = ScriptTable::load(&config.script.path).inspect_err(|e| {
        error!(error = %e, "Failed to load protocol script");
    })?;
    info!(count = scripts.len(), "Loaded server messages");

    // 4. Shared state and dispatcher.
    let (state, _dispatcher_handle) =
        AppState::new(IconCatalog::default(), scripts, config.game.clone());
    let state = Arc::new(state);

    // 5. Operator console.
    let console_scripts = Arc::clone(&state.scripts);
    let console_dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = run_console(stdin, console_scripts, console_dispatcher).await {
            error!(error = %e, "Console reader failed");
        }
    });

    // 6. Serve until the listener fails.
    start_server(&config.server, state).await?;

    Ok(())
}
