//! Session coordinator for the microgame party game.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/game`) through which participants pick an
//!   icon, submit a name, receive microgame signals and report results
//! - **Status endpoints** (`/healthz`, `/api/status`)
//!
//! # Architecture
//!
//! All shared mutable state lives in one [`Registry`] behind a single
//! mutex that is never held across I/O. Messages for everyone go through
//! the [`Dispatcher`], a single consumer task that fans each frame out in
//! queue order. Direct replies go straight to the requesting connection's
//! outbound queue. The [`MicrogameScheduler`] loop is launched exactly
//! once, by the first participant to submit a name.
//!
//! [`Registry`]: registry::Registry
//! [`Dispatcher`]: dispatcher::Dispatcher
//! [`MicrogameScheduler`]: scheduler::MicrogameScheduler

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod handlers;
pub mod icons;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod script;
pub mod server;
pub mod state;
pub mod validator;
pub mod ws;

// Re-export primary types for convenience.
pub use config::{ConfigError, CoordinatorConfig, GameConfig};
pub use router::build_router;
pub use script::{ScriptError, ScriptTable};
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
