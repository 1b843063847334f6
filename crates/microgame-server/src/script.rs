//! Scripted server messages loaded from the protocol script.
//!
//! The script is a stream of JSON objects (concatenated or one per line)
//! recorded from a reference session. Only objects sent by the server are
//! kept, indexed by their `type`; a later object of the same type replaces
//! an earlier one. Each payload is stored exactly as it appears in the
//! file so replaying it is byte-for-byte faithful.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use serde_json::value::RawValue;

/// Errors that can occur when loading the protocol script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Failed to read the script file.
    #[error("failed to read script {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The script is not a valid stream of JSON values.
    #[error("failed to parse script JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only table of scripted server payloads keyed by message type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptTable {
    messages: BTreeMap<String, String>,
}

impl ScriptTable {
    /// Parse a script from text.
    ///
    /// Values that are not objects, lack a string `type`, or do not carry
    /// `from: "server"` are skipped.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut messages = BTreeMap::new();

        let stream = serde_json::Deserializer::from_str(text).into_iter::<Box<RawValue>>();
        for item in stream {
            let raw = item?;
            let header: Value = serde_json::from_str(raw.get())?;
            let from_server = header.get("from").and_then(Value::as_str) == Some("server");
            let Some(message_type) = header.get("type").and_then(Value::as_str) else {
                continue;
            };
            if from_server {
                messages.insert(message_type.to_owned(), raw.get().to_owned());
            }
        }

        Ok(Self { messages })
    }

    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// The stored payload for `message_type`.
    pub fn get(&self, message_type: &str) -> Option<&str> {
        self.messages.get(message_type).map(String::as_str)
    }

    /// Known message types, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
