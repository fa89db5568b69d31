//! Session context
//!
//! Identity of one ingest connection, carried in log fields and handed to
//! callers that need to know who they are talking to.

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::StreamKey;

/// Per-connection information
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the connection was accepted
    pub connected_at: Instant,

    /// Stream key, set once a publish is accepted
    pub stream_key: Option<StreamKey>,
}

impl SessionContext {
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            connected_at: Instant::now(),
            stream_key: None,
        }
    }

    /// Stream key as a string, if bound
    pub fn stream_key_str(&self) -> Option<&str> {
        self.stream_key.as_ref().map(|k| k.as_str())
    }
}
