//! JSON messages exchanged over the game socket.
//!
//! Every message is an object whose `type` field selects the variant.
//! Inbound frames decode once into [`ClientMessage`]; outbound frames are
//! built from [`ServerMessage`] and stamped with `from: "server"` by
//! [`ServerMessage::to_frame`].
//!
//! The scripted `microgame-start` payload is not modelled here: it is
//! loaded verbatim from the protocol script and relayed without decoding.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::SessionToken;

/// Which side of the socket produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Origin {
    /// Sent by the coordinator.
    Server,
    /// Sent by a participant.
    Client,
}

/// A message sent by a participant.
///
/// Unknown fields (including the client's own `from`) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Claim an icon.
    IconSelection {
        /// Icon name from the catalog.
        icon: String,
    },
    /// Submit a display name and ask for a session token.
    NameEntry {
        /// Display name. Optional on the wire; only logged.
        #[serde(default)]
        name: Option<String>,
    },
    /// Report the outcome of the current microgame.
    MicrogameResult {
        /// Token previously issued in `name-validation`.
        id: SessionToken,
        /// Score in percent, `0..=100`.
        percentage: f64,
    },
}

/// A message built by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Icons nobody currently holds, in catalog order.
    IconsAvailable {
        /// Unclaimed icon names.
        icons: Vec<String>,
    },
    /// Reply to `name-entry` carrying the participant's token.
    NameValidation {
        /// Newly issued session token.
        guid: SessionToken,
    },
    /// Free text to show on the client.
    DisplayText {
        /// Text to display.
        text: String,
    },
    /// All results are in; the round is over.
    MicrogameEnd,
}

/// Wire envelope adding the constant `from` field.
#[derive(Serialize)]
struct ServerFrame<'a> {
    from: Origin,
    #[serde(flatten)]
    message: &'a ServerMessage,
}

impl ServerMessage {
    /// Serialize to the JSON text sent on the socket.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&ServerFrame {
            from: Origin::Server,
            message: self,
        })
    }
}
