//! Operator console: replay scripted messages by typing their type name.
//!
//! Each input line is trimmed and looked up in the [`ScriptTable`]. A hit
//! is broadcast verbatim through the dispatcher; a miss is logged.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::script::ScriptTable;

/// Broadcast the scripted message named by `command`.
///
/// Returns `true` if a message was queued. Blank lines are ignored
/// silently.
pub fn replay(command: &str, scripts: &ScriptTable, dispatcher: &Dispatcher) -> bool {
    let message_type = command.trim();
    if message_type.is_empty() {
        return false;
    }
    match scripts.get(message_type) {
        Some(payload) => {
            let queued = dispatcher.enqueue(payload);
            info!(message_type, "Sending scripted message");
            queued
        }
        None => {
            warn!(message_type, "Unknown message type");
            false
        }
    }
}

/// Read commands from `input` until it closes.
///
/// # Errors
///
/// Returns the I/O error that ended the read.
pub async fn run_console<R>(
    input: R,
    scripts: Arc<ScriptTable>,
    dispatcher: Dispatcher,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        replay(&line, &scripts, &dispatcher);
    }
    info!("Console input closed");
    Ok(())
}
