//! Media frames raised by the ingestion protocol

use bytes::Bytes;

use super::flv::{FlvTag, FlvTagType};

/// Kind of media frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// FLV tag type code (8 = audio, 9 = video)
    pub fn tag_type(&self) -> FlvTagType {
        match self {
            MediaKind::Audio => FlvTagType::Audio,
            MediaKind::Video => FlvTagType::Video,
        }
    }
}

/// A timestamped audio or video frame
///
/// Cheap to clone, the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    pub kind: MediaKind,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    pub payload: Bytes,
}

impl MediaFrame {
    pub fn audio(timestamp: u32, payload: Bytes) -> Self {
        Self {
            kind: MediaKind::Audio,
            timestamp,
            payload,
        }
    }

    pub fn video(timestamp: u32, payload: Bytes) -> Self {
        Self {
            kind: MediaKind::Video,
            timestamp,
            payload,
        }
    }

    /// View the frame as the FLV tag it will become
    pub fn as_flv_tag(&self) -> FlvTag {
        FlvTag {
            tag_type: self.kind.tag_type(),
            timestamp: self.timestamp,
            data: self.payload.clone(),
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.as_flv_tag().is_keyframe()
    }

    /// Codec configuration (AVC or AAC sequence header)
    pub fn is_sequence_header(&self) -> bool {
        let tag = self.as_flv_tag();
        tag.is_avc_sequence_header() || tag.is_aac_sequence_header()
    }
}
