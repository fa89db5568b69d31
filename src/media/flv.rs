//! FLV container layout
//!
//! FLV is the container the transcoder reads from its stdin. Each RTMP
//! audio/video message body becomes the data of one FLV tag.
//!
//! ```text
//! +============+==================+==============+==================+
//! | FLV Header | PrevTagSize0 (0) | Tag 1        | PrevTagSize1 ... |
//! | (9 bytes)  | (4 bytes)        | (11+N bytes) | (4 bytes)        |
//! +============+==================+==============+==================+
//!
//! Tag:
//! +--------+-------------+-----------+-------------+---------+-------------+
//! | Type(1)| DataSize(3) | TS(3+1)   | StreamID(3) | Data(N) | PrevSize(4) |
//! +--------+-------------+-----------+-------------+---------+-------------+
//! ```
//!
//! All integers are big-endian. The timestamp stores its low 24 bits first
//! and the high 8 bits in the extension byte.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Stream header (9 bytes) followed by PreviousTagSize0 (4 bytes)
pub const FLV_HEADER: [u8; 13] = [
    b'F', b'L', b'V', // Signature
    0x01, // Version
    0x05, // Flags: audio + video
    0x00, 0x00, 0x00, 0x09, // Header size
    0x00, 0x00, 0x00, 0x00, // PreviousTagSize0
];

/// Size of a tag header
pub const TAG_HEADER_SIZE: usize = 11;

/// Size of the PreviousTagSize trailer after each tag
pub const TAG_TRAILER_SIZE: usize = 4;

/// Largest payload the 24-bit DataSize field can describe
pub const MAX_TAG_DATA_SIZE: usize = 0x00FF_FFFF;

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio,
    Video,
    Script,
}

impl FlvTagType {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            8 => Some(FlvTagType::Audio),
            9 => Some(FlvTagType::Video),
            18 => Some(FlvTagType::Script),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            FlvTagType::Audio => 8,
            FlvTagType::Video => 9,
            FlvTagType::Script => 18,
        }
    }
}

/// One FLV tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    /// Tag type
    pub tag_type: FlvTagType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    /// Tag data (codec header byte included)
    pub data: Bytes,
}

impl FlvTag {
    /// Append a complete tag (header, data, trailer) to `buf`
    ///
    /// Fails before touching `buf` if `data` does not fit the length field.
    pub fn encode(tag_type: FlvTagType, timestamp: u32, data: &[u8], buf: &mut BytesMut) -> Result<()> {
        if data.len() > MAX_TAG_DATA_SIZE {
            return Err(Error::FrameTooLarge(data.len()));
        }
        let data_size = data.len() as u32;

        buf.reserve(TAG_HEADER_SIZE + data.len() + TAG_TRAILER_SIZE);
        buf.put_u8(tag_type.as_u8());
        buf.put_uint(data_size as u64, 3);
        buf.put_uint((timestamp & 0x00FF_FFFF) as u64, 3);
        buf.put_u8((timestamp >> 24) as u8);
        buf.put_uint(0, 3); // Stream ID, always 0
        buf.put_slice(data);
        buf.put_u32(TAG_HEADER_SIZE as u32 + data_size);
        Ok(())
    }

    /// Parse one tag from the front of `buf`
    ///
    /// Returns the tag and the number of bytes consumed (trailer included),
    /// or `None` if `buf` holds an incomplete tag, an unknown type, or a
    /// trailer that does not match the tag size.
    pub fn decode(buf: &[u8]) -> Option<(FlvTag, usize)> {
        if buf.len() < TAG_HEADER_SIZE {
            return None;
        }

        let tag_type = FlvTagType::from_u8(buf[0])?;
        let data_size = u32::from_be_bytes([0, buf[1], buf[2], buf[3]]) as usize;
        let timestamp = u32::from_be_bytes([buf[7], buf[4], buf[5], buf[6]]);

        let end = TAG_HEADER_SIZE + data_size;
        let total = end + TAG_TRAILER_SIZE;
        if buf.len() < total {
            return None;
        }

        let trailer = u32::from_be_bytes([buf[end], buf[end + 1], buf[end + 2], buf[end + 3]]);
        if trailer as usize != end {
            return None;
        }

        let tag = FlvTag {
            tag_type,
            timestamp,
            data: Bytes::copy_from_slice(&buf[TAG_HEADER_SIZE..end]),
        };
        Some((tag, total))
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == FlvTagType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.tag_type == FlvTagType::Audio
    }

    /// Video keyframe (frame type 1, or 4 for server-generated keyframes)
    pub fn is_keyframe(&self) -> bool {
        self.is_video()
            && self
                .data
                .first()
                .is_some_and(|b| matches!(b >> 4, 1 | 4))
    }

    /// AVC decoder configuration record
    pub fn is_avc_sequence_header(&self) -> bool {
        self.is_video() && self.data.len() >= 2 && self.data[0] & 0x0F == 7 && self.data[1] == 0
    }

    /// AAC AudioSpecificConfig
    pub fn is_aac_sequence_header(&self) -> bool {
        self.is_audio() && self.data.len() >= 2 && self.data[0] >> 4 == 10 && self.data[1] == 0
    }
}
