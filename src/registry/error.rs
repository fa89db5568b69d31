//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No stream under this key (or id)
    StreamNotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::StreamNotFound(key) => write!(f, "Stream not found: {}", key),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Error raised by a stream aggregate transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// `go_live` on a stream that is already live
    AlreadyLive(String),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::AlreadyLive(key) => write!(f, "Stream is already live: {}", key),
        }
    }
}

impl std::error::Error for StreamError {}
