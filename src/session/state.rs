//! Ingest session state machine
//!
//! ```text
//!   Connected ──publish ok──► Publishing ──close──► Closed
//!       │                                             ▲
//!       └──────────────────close──────────────────────┘
//! ```
//!
//! A session owns exactly one muxer/sink pair, created by a successful
//! publish and released exactly once on close. Frames arriving while no
//! sink is ready are discarded rather than buffered.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::lifecycle::StreamLifecycle;
use crate::media::{FlvMuxer, MediaFrame};
use crate::registry::{StreamKey, StreamRepository};
use crate::stats::SessionStats;
use crate::transcode::{SinkExit, SinkInput, Transcoder};

use super::context::SessionContext;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, not publishing
    Connected,
    /// Publish accepted, frames flow to the transcoder
    Publishing,
    /// Session closed; nothing else is accepted
    Closed,
}

/// Per-connection orchestrator
pub struct IngestSession<R, T> {
    ctx: SessionContext,
    phase: SessionPhase,
    lifecycle: Arc<StreamLifecycle<R>>,
    transcoder: Arc<T>,
    muxer: Option<FlvMuxer<SinkInput>>,
    sink_exit: Option<oneshot::Receiver<SinkExit>>,
    /// Key this session took live and has not yet returned to idle
    live_key: Option<StreamKey>,
    stats: SessionStats,
    stop_stream_on_close: bool,
}

impl<R: StreamRepository, T: Transcoder> IngestSession<R, T> {
    pub fn new(ctx: SessionContext, lifecycle: Arc<StreamLifecycle<R>>, transcoder: Arc<T>) -> Self {
        Self {
            ctx,
            phase: SessionPhase::Connected,
            lifecycle,
            transcoder,
            muxer: None,
            sink_exit: None,
            live_key: None,
            stats: SessionStats::new(),
            stop_stream_on_close: true,
        }
    }

    /// Whether closing a publishing session returns its stream to idle
    pub fn stop_stream_on_close(mut self, enabled: bool) -> Self {
        self.stop_stream_on_close = enabled;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Whether a sink is currently attached
    pub fn has_sink(&self) -> bool {
        self.muxer.is_some()
    }

    pub fn on_connect(&mut self) {
        tracing::debug!(
            session_id = self.ctx.session_id,
            peer = %self.ctx.peer_addr,
            "Client connected"
        );
    }

    /// Handle a publish request
    ///
    /// On success the stream is live, a transcoder is running and the
    /// container header has been written. On failure the session stays
    /// `Connected` and nothing is left allocated.
    pub async fn on_publish(&mut self, publishing_name: &str) -> Result<()> {
        match self.phase {
            SessionPhase::Connected => {}
            SessionPhase::Publishing => {
                return Err(Error::ProtocolRejection(format!(
                    "session {} is already publishing",
                    self.ctx.session_id
                )));
            }
            SessionPhase::Closed => return Err(Error::ConnectionClosed),
        }

        let key = StreamKey::from_publishing_name(publishing_name)?;
        tracing::info!(session_id = self.ctx.session_id, stream = %key, "Publish requested");

        if let Err(e) = self.lifecycle.start_stream(key.as_str()).await {
            if e.is_domain() {
                tracing::info!(session_id = self.ctx.session_id, stream = %key, reason = %e, "Publish rejected");
            } else {
                tracing::warn!(
                    session_id = self.ctx.session_id,
                    stream = %key,
                    error = %e,
                    "Publish failed"
                );
            }
            return Err(e);
        }
        // From here on a cancelled publish is rolled back by on_close
        self.live_key = Some(key.clone());

        if let Err(e) = self.attach_sink(&key).await {
            tracing::warn!(
                session_id = self.ctx.session_id,
                stream = %key,
                error = %e,
                "Transcoder setup failed"
            );
            self.live_key = None;
            Self::rollback_live(&self.lifecycle, &key).await;
            return Err(e);
        }

        self.ctx.stream_key = Some(key);
        self.phase = SessionPhase::Publishing;

        tracing::info!(
            session_id = self.ctx.session_id,
            stream = ?self.ctx.stream_key_str(),
            "Stream started, piping data"
        );
        Ok(())
    }

    async fn attach_sink(&mut self, key: &StreamKey) -> Result<()> {
        let sink = self.transcoder.start(key).await?;

        let mut muxer = FlvMuxer::new(sink.input);
        // Dropping the muxer on failure closes the transcoder's input
        muxer.write_header().await?;

        self.muxer = Some(muxer);
        self.sink_exit = Some(sink.exit);
        Ok(())
    }

    /// Undo a go-live whose sink never came up
    async fn rollback_live(lifecycle: &StreamLifecycle<R>, key: &StreamKey) {
        if let Err(e) = lifecycle.stop_stream(key.as_str()).await {
            tracing::warn!(stream = %key, error = %e, "Failed to roll back stream state");
        }
    }

    pub async fn on_audio(&mut self, timestamp: u32, payload: Bytes) -> Result<()> {
        self.on_frame(MediaFrame::audio(timestamp, payload)).await
    }

    pub async fn on_video(&mut self, timestamp: u32, payload: Bytes) -> Result<()> {
        self.on_frame(MediaFrame::video(timestamp, payload)).await
    }

    /// Forward a frame to the transcoder, or discard it if no sink is ready
    ///
    /// A write failure releases the sink immediately; frames are never
    /// retried.
    pub async fn on_frame(&mut self, frame: MediaFrame) -> Result<()> {
        let muxer = match (self.phase, self.muxer.as_mut()) {
            (SessionPhase::Publishing, Some(muxer)) => muxer,
            _ => {
                self.stats.record_dropped(&frame);
                tracing::trace!(
                    session_id = self.ctx.session_id,
                    kind = ?frame.kind,
                    timestamp = frame.timestamp,
                    "Frame discarded, no sink"
                );
                return Ok(());
            }
        };

        match muxer
            .write_frame(frame.kind, frame.timestamp, &frame.payload)
            .await
        {
            Ok(written) => {
                self.stats.record_written(&frame, written);
                if frame.is_sequence_header() {
                    tracing::debug!(
                        session_id = self.ctx.session_id,
                        kind = ?frame.kind,
                        "Sequence header forwarded"
                    );
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    session_id = self.ctx.session_id,
                    stream = ?self.ctx.stream_key_str(),
                    error = %e,
                    "Frame write failed, releasing transcoder input"
                );
                self.muxer = None;
                Err(e)
            }
        }
    }

    /// Drop the transcoder input without flushing or shutting it down
    ///
    /// Used when a write to the sink was cancelled mid-tag: the input is
    /// closed as-is and the session takes no further frames.
    pub fn abandon_sink(&mut self) {
        if self.muxer.take().is_some() {
            tracing::warn!(
                session_id = self.ctx.session_id,
                stream = ?self.ctx.stream_key_str(),
                "Transcoder input abandoned"
            );
        }
    }

    /// Wait for the transcoder to exit
    ///
    /// Never resolves while no transcoder is attached, so it can sit in a
    /// `select!` next to the event source.
    pub async fn sink_exited(&mut self) -> SinkExit {
        let Some(exit) = self.sink_exit.as_mut() else {
            return std::future::pending().await;
        };

        let result = exit.await;
        self.sink_exit = None;

        match result {
            Ok(exit) => exit,
            Err(_) => std::future::pending().await,
        }
    }

    /// Record a transcoder exit
    ///
    /// The session keeps running; the next frame written to the dead sink
    /// fails and ends the connection.
    pub fn on_sink_exit(&mut self, exit: &SinkExit) {
        if exit.success {
            tracing::info!(
                session_id = self.ctx.session_id,
                stream = %exit.stream_key,
                "Transcoder exited"
            );
        } else {
            tracing::warn!(
                session_id = self.ctx.session_id,
                stream = %exit.stream_key,
                code = ?exit.code,
                detail = ?exit.detail,
                "Transcoder exited with failure"
            );
        }
    }

    /// Close the session. Idempotent.
    ///
    /// Releases the transcoder input and, for a session that was
    /// publishing, returns its stream to idle.
    pub async fn on_close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        let was_publishing = self.phase == SessionPhase::Publishing;
        self.phase = SessionPhase::Closed;

        if let Some(mut muxer) = self.muxer.take() {
            if let Err(e) = muxer.shutdown().await {
                tracing::debug!(session_id = self.ctx.session_id, error = %e, "Transcoder input shutdown failed");
            }
            tracing::info!(
                session_id = self.ctx.session_id,
                stream = ?self.ctx.stream_key_str(),
                "Transcoder input closed"
            );
        }

        // A publish that never completed is always undone
        if let Some(key) = self.live_key.take() {
            if !was_publishing || self.stop_stream_on_close {
                if let Err(e) = self.lifecycle.stop_stream(key.as_str()).await {
                    tracing::warn!(stream = %key, error = %e, "Failed to stop stream");
                }
            }
        }

        self.stats.duration = self.ctx.connected_at.elapsed();
        self.stats.calculate_bitrate();

        tracing::info!(
            session_id = self.ctx.session_id,
            stream = ?self.ctx.stream_key_str(),
            video_frames = self.stats.video_frames,
            audio_frames = self.stats.audio_frames,
            dropped_frames = self.stats.dropped_frames,
            bytes_written = self.stats.bytes_written,
            "Session closed"
        );
    }
}
