//! Media handling
//!
//! This module provides:
//! - Media frame types raised by the ingestion protocol
//! - FLV tag layout (encode, decode, codec byte classification)
//! - The FLV muxer feeding the transcoder

pub mod flv;
pub mod frame;
pub mod muxer;

pub use flv::{FlvTag, FlvTagType, FLV_HEADER};
pub use frame::{MediaFrame, MediaKind};
pub use muxer::FlvMuxer;
