//! Live stream ingestion core
//!
//! Turns publisher connection events into stream lifecycle transitions and
//! an FLV byte stream piped into a transcoder.
//!
//! ```text
//!  protocol layer ──events──► IngestSession ──start_stream──► StreamLifecycle ──► registry
//!                                  │
//!                                  └──FlvMuxer──► TranscodeSink (ffmpeg stdin) ──► HLS files
//! ```
//!
//! The wire protocol is not part of this crate. A protocol layer opens a
//! connection on an [`IngestServer`] and raises connect, publish, media and
//! close events through the returned [`ConnectionHandle`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use live_ingest::{HlsTranscoder, InMemoryStreamRegistry, IngestServer, ServerConfig, Stream};
//!
//! # async fn run() -> live_ingest::Result<()> {
//! let registry = Arc::new(InMemoryStreamRegistry::new());
//! registry.seed(Stream::new("stream-1", "live_demo")).await;
//!
//! let server = IngestServer::new(ServerConfig::default(), registry, Arc::new(HlsTranscoder::default()));
//!
//! let conn = server.open_connection("127.0.0.1:50000".parse().unwrap())?;
//! conn.connect().await?;
//! conn.publish("live_demo?user=demo").await?;
//! conn.video(0, Bytes::from_static(&[0x17, 0x00, 0x00, 0x00, 0x00])).await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod lifecycle;
pub mod media;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod transcode;

pub use error::{Error, Result};
pub use lifecycle::StreamLifecycle;
pub use media::{FlvMuxer, FlvTag, FlvTagType, MediaFrame, MediaKind};
pub use registry::{InMemoryStreamRegistry, Stream, StreamKey, StreamRepository, StreamStatus};
pub use server::{ConnectionHandle, IngestServer, ServerConfig};
pub use session::{IngestEvent, IngestSession, SessionContext, SessionPhase};
pub use stats::SessionStats;
pub use transcode::{
    CaptureTranscoder, HlsTranscoder, SinkExit, TranscodeSink, Transcoder, TranscoderConfig,
};
