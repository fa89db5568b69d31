//! Transcoder boundary
//!
//! A transcoder is started once per published stream and handed the FLV
//! byte stream on a writable sink. Its termination is reported out-of-band
//! on a oneshot channel, never through the write path.
//!
//! ```text
//!  IngestSession ──FlvMuxer──► TranscodeSink.input ──► ffmpeg stdin
//!        ▲                                               │
//!        └──────────── TranscodeSink.exit ◄── wait() ────┘
//! ```

pub mod capture;
pub mod config;
pub mod hls;

use std::future::Future;

use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::registry::StreamKey;

pub use capture::CaptureTranscoder;
pub use config::TranscoderConfig;
pub use hls::HlsTranscoder;

/// Writable input of a running transcoder
pub type SinkInput = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to a started transcoder
pub struct TranscodeSink {
    /// Container bytes go here; dropping or shutting it down ends input
    pub input: SinkInput,
    /// Resolves once the transcoder has exited
    pub exit: oneshot::Receiver<SinkExit>,
}

impl std::fmt::Debug for TranscodeSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeSink").finish_non_exhaustive()
    }
}

/// How a transcoder ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkExit {
    /// Stream the transcoder was started for
    pub stream_key: String,
    /// Whether it ended cleanly
    pub success: bool,
    /// Process exit code, if there was one
    pub code: Option<i32>,
    /// Failure detail when the exit could not be observed normally
    pub detail: Option<String>,
}

/// Starts transcoders for published streams
pub trait Transcoder: Send + Sync + 'static {
    /// Start transcoding `key`, returning its input sink
    ///
    /// Fails with `Error::SinkUnavailable` if the transcoder cannot start.
    fn start(&self, key: &StreamKey) -> impl Future<Output = Result<TranscodeSink>> + Send;
}
