//! Statistics for ingest sessions

use std::time::Duration;

use crate::media::{MediaFrame, MediaKind};

/// Session-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Payload bytes received from the publisher
    pub bytes_received: u64,
    /// Container bytes written to the transcoder
    pub bytes_written: u64,
    /// Connection duration
    pub duration: Duration,
    /// Video frames written
    pub video_frames: u64,
    /// Audio frames written
    pub audio_frames: u64,
    /// Keyframes written
    pub keyframes: u64,
    /// Frames discarded because no sink was ready
    pub dropped_frames: u64,
    /// Bitrate delivered to the transcoder (bits/sec)
    pub bitrate: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a frame that reached the sink as `written` container bytes
    pub fn record_written(&mut self, frame: &MediaFrame, written: usize) {
        self.bytes_received += frame.payload.len() as u64;
        self.bytes_written += written as u64;

        if frame.kind == MediaKind::Video {
            self.video_frames += 1;
            if frame.is_keyframe() {
                self.keyframes += 1;
            }
        } else {
            self.audio_frames += 1;
        }
    }

    /// Count a frame that was discarded
    pub fn record_dropped(&mut self, frame: &MediaFrame) {
        self.bytes_received += frame.payload.len() as u64;
        self.dropped_frames += 1;
    }

    /// Calculate the delivered bitrate from bytes written and duration
    pub fn calculate_bitrate(&mut self) {
        let secs = self.duration.as_secs();
        if secs > 0 {
            self.bitrate = (self.bytes_written * 8) / secs;
        }
    }
}
