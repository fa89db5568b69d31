//! Connection task and handle
//!
//! Each ingest connection runs as its own task owning one
//! [`IngestSession`]. The protocol layer talks to it through a
//! [`ConnectionHandle`], which forwards events over a bounded channel so a
//! slow transcoder back-pressures the publisher instead of buffering.
//!
//! Every sink write is raced against server shutdown and the close
//! deadline, so a transcoder that stops reading cannot keep a session (and
//! its stream) alive.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::media::MediaFrame;
use crate::registry::StreamRepository;
use crate::session::{IngestEvent, IngestSession};
use crate::stats::SessionStats;
use crate::transcode::Transcoder;

/// Protocol-side handle to a running connection
///
/// Dropping the handle without `close` or `join` ends the connection at
/// once; queued events are discarded.
#[derive(Debug)]
pub struct ConnectionHandle {
    session_id: u64,
    events: mpsc::Sender<IngestEvent>,
    close_requested: watch::Sender<bool>,
    task: JoinHandle<SessionStats>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        session_id: u64,
        events: mpsc::Sender<IngestEvent>,
        close_requested: watch::Sender<bool>,
        task: JoinHandle<SessionStats>,
    ) -> Self {
        Self {
            session_id,
            events,
            close_requested,
            task,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Whether the connection task has stopped accepting events
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    /// Raise a raw event
    pub async fn send(&self, event: IngestEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    pub async fn connect(&self) -> Result<()> {
        self.send(IngestEvent::Connect).await
    }

    /// Request to publish and wait for the verdict
    ///
    /// A rejected publish ends the connection.
    pub async fn publish(&self, publishing_name: &str) -> Result<()> {
        let (reply, verdict) = oneshot::channel();
        self.send(IngestEvent::Publish {
            publishing_name: publishing_name.to_string(),
            reply: Some(reply),
        })
        .await?;

        verdict.await.map_err(|_| Error::ConnectionClosed)?
    }

    pub async fn audio(&self, timestamp: u32, payload: Bytes) -> Result<()> {
        self.send(IngestEvent::Media(MediaFrame::audio(timestamp, payload)))
            .await
    }

    pub async fn video(&self, timestamp: u32, payload: Bytes) -> Result<()> {
        self.send(IngestEvent::Media(MediaFrame::video(timestamp, payload)))
            .await
    }

    /// Close the connection and wait for its session to finish
    ///
    /// Frames already queued are still written if the transcoder takes them
    /// within the server's `close_timeout`; after that the transcoder input
    /// is abandoned.
    pub async fn close(self) -> Result<SessionStats> {
        self.close_requested.send_replace(true);
        self.join().await
    }

    /// Stop sending events and wait for the connection task to end
    pub async fn join(self) -> Result<SessionStats> {
        let Self {
            events,
            close_requested,
            task,
            ..
        } = self;
        drop(events);

        let result = task.await.map_err(|e| {
            tracing::error!(error = %e, "Connection task failed");
            Error::ConnectionClosed
        });
        drop(close_requested);
        result
    }
}

/// Close request from the handle and its drain deadline
struct CloseWatch {
    requested: watch::Receiver<bool>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl CloseWatch {
    fn new(requested: watch::Receiver<bool>, timeout: Duration) -> Self {
        Self {
            requested,
            timeout,
            deadline: None,
        }
    }

    /// Resolves once the connection must stop: the drain deadline after a
    /// close request has passed, or the handle was dropped.
    async fn expired(&mut self) {
        loop {
            if let Some(deadline) = self.deadline {
                tokio::time::sleep_until(deadline).await;
                return;
            }

            let dropped = self.requested.wait_for(|closing| *closing).await.is_err();
            if dropped {
                return;
            }
            self.deadline = Some(Instant::now() + self.timeout);
        }
    }
}

/// Drive one session until the peer closes, an error ends it, or the
/// server shuts down. The session is always closed on the way out.
pub(crate) async fn run_connection<R, T>(
    mut session: IngestSession<R, T>,
    mut events: mpsc::Receiver<IngestEvent>,
    mut shutdown: watch::Receiver<bool>,
    close_requested: watch::Receiver<bool>,
    close_timeout: Duration,
    permit: Option<OwnedSemaphorePermit>,
) -> SessionStats
where
    R: StreamRepository,
    T: Transcoder,
{
    let session_id = session.context().session_id;
    let mut close = CloseWatch::new(close_requested, close_timeout);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!(session_id, "Event source drained");
                    break;
                };

                let handled = tokio::select! {
                    keep = handle_event(&mut session, event) => Some(keep),
                    _ = shutdown_signalled(&mut shutdown) => None,
                    _ = close.expired() => None,
                };
                match handled {
                    Some(true) => {}
                    Some(false) => break,
                    None => {
                        tracing::warn!(session_id, "Transcoder stalled, cancelling session");
                        session.abandon_sink();
                        break;
                    }
                }
            }
            exit = session.sink_exited() => session.on_sink_exit(&exit),
            _ = shutdown_signalled(&mut shutdown) => {
                tracing::info!(session_id, "Server shutting down, closing session");
                break;
            }
            _ = close.expired() => {
                tracing::debug!(session_id, "Close deadline reached");
                break;
            }
        }
    }

    events.close();
    session.on_close().await;
    drop(permit);

    tracing::debug!(session_id, "Connection closed");
    session.stats().clone()
}

async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    // A dropped server counts as shutdown
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// Apply one event. Returns `false` once the connection should end.
async fn handle_event<R, T>(session: &mut IngestSession<R, T>, event: IngestEvent) -> bool
where
    R: StreamRepository,
    T: Transcoder,
{
    match event {
        IngestEvent::Connect => {
            session.on_connect();
            true
        }
        IngestEvent::Publish {
            publishing_name,
            reply,
        } => {
            let result = session.on_publish(&publishing_name).await;
            let accepted = result.is_ok();
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
            accepted
        }
        IngestEvent::Media(frame) => match session.on_frame(frame).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    session_id = session.context().session_id,
                    error = %e,
                    "Ending connection after write failure"
                );
                false
            }
        },
        IngestEvent::Close => false,
    }
}
