//! Shared type definitions for the microgame session coordinator.
//!
//! Types defined here are used by the server and flow to the TypeScript
//! client via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for connections and session tokens
//! - [`catalog`] -- The ordered icon catalog
//! - [`protocol`] -- Inbound and outbound socket messages

pub mod catalog;
pub mod ids;
pub mod protocol;

pub use catalog::{DEFAULT_ICONS, IconCatalog};
pub use ids::{ConnectionId, SessionToken};
pub use protocol::{ClientMessage, Origin, ServerMessage};
