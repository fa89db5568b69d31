//! FLV muxer
//!
//! Turns media frames into an FLV byte stream on an async writer. Every
//! write is flushed immediately: the transcoder should see each tag as soon
//! as it arrives rather than when a buffer fills. A slow reader stalls the
//! writing task through the writer's own back-pressure.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

use super::flv::{FlvTag, FLV_HEADER};
use super::frame::MediaKind;

/// FLV encoder over an async byte sink
///
/// Holds no frames between calls; the scratch buffer only ever contains the
/// tag currently being written.
pub struct FlvMuxer<W> {
    writer: W,
    scratch: BytesMut,
}

impl<W: AsyncWrite + Unpin> FlvMuxer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Write the 13-byte stream header and flush
    pub async fn write_header(&mut self) -> Result<()> {
        self.writer.write_all(&FLV_HEADER).await.map_err(Error::write)?;
        self.writer.flush().await.map_err(Error::write)
    }

    /// Write one tag and flush
    ///
    /// Returns the number of bytes written, trailer included.
    pub async fn write_frame(&mut self, kind: MediaKind, timestamp: u32, payload: &[u8]) -> Result<usize> {
        self.scratch.clear();
        FlvTag::encode(kind.tag_type(), timestamp, payload, &mut self.scratch)?;

        self.writer.write_all(&self.scratch).await.map_err(Error::write)?;
        self.writer.flush().await.map_err(Error::write)?;
        Ok(self.scratch.len())
    }

    /// Signal end of input to the sink
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(Error::write)
    }
}
