//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Connections and session tokens are both UUIDs on the wire, but mixing
//! them up is always a bug: a token is handed to the client and echoed back
//! with results, while a connection ID never leaves the server.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
///
/// The second argument is the expression used to mint a fresh value.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $generate:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a new identifier.
            pub fn new() -> Self {
                Self($generate)
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Server-side handle for one live game socket.
    ///
    /// Time-ordered (v7) so log lines sort by connect order.
    ConnectionId, Uuid::now_v7()
}

define_id! {
    /// Token issued to a participant when their name is accepted.
    ///
    /// Random (v4): the token is the only credential a client holds, so it
    /// must not be guessable from connect time.
    SessionToken, Uuid::new_v4()
}
