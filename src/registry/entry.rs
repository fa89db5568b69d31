//! Stream aggregate
//!
//! The authoritative lifecycle state of one logical stream. All rules for
//! "can this stream start" live here; callers never inspect `status` to
//! decide.

use std::time::SystemTime;

use super::error::StreamError;

/// Lifecycle status of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    /// Provisioned, nobody publishing
    Idle,
    /// A publisher is live
    Live,
    /// Publisher dropped and is expected back
    Reconnecting,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Idle => "IDLE",
            StreamStatus::Live => "LIVE",
            StreamStatus::Reconnecting => "RECONNECTING",
        }
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical stream slot
///
/// `started_at` is `Some` if and only if `status == Live`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    id: String,
    stream_key: String,
    status: StreamStatus,
    started_at: Option<SystemTime>,
    /// Informational only; nothing in the ingest path reads or updates it.
    pub viewer_count: u32,
}

impl Stream {
    /// Create a new idle stream
    pub fn new(id: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stream_key: stream_key.into(),
            status: StreamStatus::Idle,
            started_at: None,
            viewer_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn is_live(&self) -> bool {
        self.status == StreamStatus::Live
    }

    /// Transition to `Live`
    ///
    /// Fails without mutating anything if the stream is already live.
    pub fn go_live(&mut self) -> Result<(), StreamError> {
        if self.status == StreamStatus::Live {
            return Err(StreamError::AlreadyLive(self.stream_key.clone()));
        }
        self.status = StreamStatus::Live;
        self.started_at = Some(SystemTime::now());
        Ok(())
    }

    /// Transition to `Idle`. Idempotent.
    pub fn stop(&mut self) {
        self.status = StreamStatus::Idle;
        self.started_at = None;
    }

    /// Transition to `Reconnecting`, clearing the start time
    pub fn mark_reconnecting(&mut self) {
        self.status = StreamStatus::Reconnecting;
        self.started_at = None;
    }

    /// Force a status while keeping the start-time invariant
    pub(crate) fn apply_status(&mut self, status: StreamStatus) {
        match status {
            StreamStatus::Live => {
                self.status = StreamStatus::Live;
                self.started_at.get_or_insert_with(SystemTime::now);
            }
            StreamStatus::Idle => self.stop(),
            StreamStatus::Reconnecting => self.mark_reconnecting(),
        }
    }
}
