//! Server configuration

use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Events buffered per connection before the protocol layer is
    /// made to wait
    pub event_buffer: usize,

    /// Return a stream to idle when its publishing session closes
    pub stop_stream_on_close: bool,

    /// How long a closing connection may keep draining queued frames into
    /// its transcoder before the input is abandoned
    pub close_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 0, // Unlimited
            event_buffer: 256,
            stop_stream_on_close: true,
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection event buffer (at least 1)
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    /// Set the close drain timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Leave streams live after their publisher disconnects
    pub fn keep_stream_live_on_close(mut self) -> Self {
        self.stop_stream_on_close = false;
        self
    }
}
