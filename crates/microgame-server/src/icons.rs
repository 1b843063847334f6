//! Icon allocation on top of the registry.
//!
//! Exclusivity itself is enforced inside [`Registry::set_icon`], which
//! checks and assigns under one lock hold. This layer decides who hears
//! about the outcome: an accepted claim is broadcast to everyone, a
//! rejected one is answered to the requester alone with the current list.

use microgame_types::{ConnectionId, ServerMessage};
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, encode};
use crate::registry::Registry;

/// Outcome of an icon selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The icon is now held by the requester.
    Accepted,
    /// The icon is held by someone else or not in the catalog.
    Rejected,
}

/// Icon allocator bound to the shared registry and dispatcher.
#[derive(Debug, Clone)]
pub struct IconAllocator {
    registry: Registry,
    dispatcher: Dispatcher,
}

impl IconAllocator {
    /// Create an allocator over `registry`, broadcasting via `dispatcher`.
    pub const fn new(registry: Registry, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Icons no live connection holds, in catalog order.
    pub async fn available(&self) -> Vec<String> {
        self.registry.available_icons().await
    }

    /// Try to give `icon` to `conn`.
    pub async fn try_select(&self, conn: ConnectionId, icon: &str) -> Selection {
        let accepted =
            self.registry.catalog().contains(icon) && self.registry.set_icon(conn, icon).await;

        if accepted {
            info!(%conn, icon, "Icon selected");
            self.broadcast_available();
            Selection::Accepted
        } else {
            info!(%conn, icon, "Icon unavailable, selection rejected");
            self.send_available(conn).await;
            Selection::Rejected
        }
    }

    /// Send the current list to one connection.
    pub async fn send_available(&self, conn: ConnectionId) {
        let icons = self.available().await;
        let Some(frame) = encode(&ServerMessage::IconsAvailable { icons }) else {
            return;
        };
        if self.registry.send_to(conn, frame).await {
            debug!(%conn, "Sent icons-available");
        } else {
            debug!(%conn, "Failed to send icons-available");
        }
    }

    /// Queue the current list for every connection.
    ///
    /// Returns `false` if the dispatcher has stopped.
    pub fn broadcast_available(&self) -> bool {
        let queued = self.dispatcher.enqueue_icons_available();
        if !queued {
            warn!("Dispatcher stopped, icons-available not queued");
        }
        queued
    }
}
