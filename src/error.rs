//! Error types
//!
//! Every error is scoped to one session or one lifecycle call. Domain errors
//! (`StreamNotFound`, `AlreadyLive`) reject a publish outright; I/O errors on
//! the sink tear the session's sink down.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::registry::{RegistryError, StreamError};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, Clone)]
pub enum Error {
    /// No stream is provisioned for the key (or id)
    StreamNotFound(String),
    /// Publish attempted on a stream that is already live
    AlreadyLive(String),
    /// The transcoder failed to start or refused input
    SinkUnavailable(String),
    /// I/O error while writing the container to the sink
    WriteFailure(Arc<io::Error>),
    /// Payload does not fit the container's 24-bit length field
    FrameTooLarge(usize),
    /// Malformed or out-of-order request from the protocol layer
    ProtocolRejection(String),
    /// Server refused the connection because it is at capacity
    ConnectionLimit,
    /// The session behind a connection handle has already finished
    ConnectionClosed,
}

impl Error {
    pub(crate) fn write(err: io::Error) -> Self {
        Error::WriteFailure(Arc::new(err))
    }

    /// Whether this error is a business-rule rejection rather than an I/O fault
    pub fn is_domain(&self) -> bool {
        matches!(self, Error::StreamNotFound(_) | Error::AlreadyLive(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StreamNotFound(key) => write!(f, "Stream not found: {}", key),
            Error::AlreadyLive(key) => write!(f, "Stream is already live: {}", key),
            Error::SinkUnavailable(reason) => write!(f, "Transcode sink unavailable: {}", reason),
            Error::WriteFailure(e) => write!(f, "Write failure: {}", e),
            Error::FrameTooLarge(len) => {
                write!(f, "Frame payload of {} bytes exceeds 24-bit length field", len)
            }
            Error::ProtocolRejection(reason) => write!(f, "Protocol rejection: {}", reason),
            Error::ConnectionLimit => write!(f, "Connection limit reached"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WriteFailure(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::StreamNotFound(key) => Error::StreamNotFound(key),
        }
    }
}

impl From<StreamError> for Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::AlreadyLive(key) => Error::AlreadyLive(key),
        }
    }
}
