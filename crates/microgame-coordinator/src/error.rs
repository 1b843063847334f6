//! Error types for the coordinator binary.

/// Top-level error for the coordinator binary.
///
/// Each variant wraps a startup or serving failure so `main` can
/// propagate with `?`. Every one of them is fatal.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: microgame_server::ConfigError,
    },

    /// The protocol script could not be loaded.
    #[error("script error: {source}")]
    Script {
        /// The underlying script error.
        #[from]
        source: microgame_server::ScriptError,
    },

    /// The listener failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: microgame_server::ServerError,
    },
}
