//! Ingest server
//!
//! Accepts connections from the protocol layer and spawns one task per
//! connection. Every task shares the registry, the lifecycle use cases and
//! the transcoder.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Semaphore};

use crate::error::{Error, Result};
use crate::lifecycle::StreamLifecycle;
use crate::registry::StreamRepository;
use crate::server::config::ServerConfig;
use crate::server::connection::{run_connection, ConnectionHandle};
use crate::session::{IngestSession, SessionContext};
use crate::transcode::Transcoder;

/// Ingest server
///
/// Dropping the server shuts its connections down.
pub struct IngestServer<R, T> {
    config: ServerConfig,
    lifecycle: Arc<StreamLifecycle<R>>,
    transcoder: Arc<T>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: watch::Sender<bool>,
}

impl<R: StreamRepository, T: Transcoder> IngestServer<R, T> {
    /// Create a new server over a stream repository and transcoder
    pub fn new(config: ServerConfig, registry: Arc<R>, transcoder: Arc<T>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            lifecycle: Arc::new(StreamLifecycle::new(registry)),
            transcoder,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown,
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<R> {
        self.lifecycle.repository()
    }

    /// Accept a connection from `peer_addr`
    ///
    /// Fails with `Error::ConnectionLimit` when the server is full, or
    /// `Error::ConnectionClosed` after shutdown.
    pub fn open_connection(&self, peer_addr: SocketAddr) -> Result<ConnectionHandle> {
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }

        // Check connection limit
        let permit = match &self.connection_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return Err(Error::ConnectionLimit);
                }
            },
            None => None,
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(session_id = session_id, peer = %peer_addr, "New connection");

        let session = IngestSession::new(
            SessionContext::new(session_id, peer_addr),
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.transcoder),
        )
        .stop_stream_on_close(self.config.stop_stream_on_close);

        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (close_tx, close_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(
            session,
            events_rx,
            self.shutdown.subscribe(),
            close_rx,
            self.config.close_timeout,
            permit,
        ));

        Ok(ConnectionHandle::new(session_id, events_tx, close_tx, task))
    }

    /// Signal every connection to close its session
    ///
    /// Returns immediately; join the connection handles to wait for the
    /// sessions to finish. New connections are refused afterwards.
    pub fn shutdown(&self) {
        tracing::info!(
            connections = self.active_connections(),
            "Ingest server shutting down"
        );
        self.shutdown.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Connections currently running
    pub fn active_connections(&self) -> usize {
        self.shutdown.receiver_count()
    }
}
