use tw_core::CoreError;

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised while configuring, running, or persisting a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// World-state validation failed (bad resource, window, duplicate id, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A configuration value is malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A requirement source names a fulfillment strategy that does not exist.
    #[error("unknown fulfillment strategy \"{strategy}\" in source \"{source_id}\"")]
    UnknownStrategy {
        /// The offending source.
        source_id: String,
        /// The tag as written.
        strategy: String,
    },

    /// A module id that the registry cannot build.
    #[error("module \"{0}\" is not in the registry")]
    UnknownModule(String),

    /// A behavior module reported a failure.
    #[error("module \"{module}\" failed: {reason}")]
    Module {
        /// Module id.
        module: String,
        /// What went wrong.
        reason: String,
    },

    /// Resume was requested but the store holds no snapshot.
    #[error("no snapshot available to resume from")]
    NoSnapshot,

    /// A driver operation was called in the wrong lifecycle state.
    #[error("simulation is {actual}, expected {expected}")]
    InvalidState {
        /// State the driver is in.
        actual: String,
        /// State the operation needs.
        expected: String,
    },

    /// Reading or writing a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
