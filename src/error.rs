use thiserror::Error as ThisError;

/// Errors that can occur in the logging library
#[derive(ThisError, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The requested sink type is not registered.
    #[error("sink not found: {name}")]
    SinkNotFound {
        /// The sink type that failed to resolve.
        name: String,
    },
    /// A level tag did not match any known level.
    #[error("unknown level: {0}")]
    UnknownLevel(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
