//! Events raised by the ingestion protocol layer

use tokio::sync::oneshot;

use crate::error::Result;
use crate::media::MediaFrame;

/// One protocol-level event for an ingest session
#[derive(Debug)]
pub enum IngestEvent {
    /// Connection established
    Connect,
    /// Publisher asked to publish under a name (may carry a `?query` suffix)
    Publish {
        publishing_name: String,
        /// Receives the verdict; a rejection also ends the connection
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    /// Audio or video frame
    Media(MediaFrame),
    /// Connection closed by the peer
    Close,
}
