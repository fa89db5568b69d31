//! Transcoder configuration

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Options for the ffmpeg HLS transcoder
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// Root directory; each stream writes to `<root>/<key>/`
    pub output_root: PathBuf,

    /// Playlist file name inside the stream directory
    pub playlist_name: String,

    /// Video encoder
    pub video_codec: String,

    /// Encoder preset
    pub preset: String,

    /// Encoder tuning
    pub tune: String,

    /// Audio encoder
    pub audio_codec: String,

    /// Audio sample rate in Hz
    pub audio_sample_rate: u32,

    /// Target segment duration in seconds
    pub segment_seconds: u32,

    /// Number of segments kept in the playlist
    pub playlist_size: u32,

    /// Delete segments that fall out of the playlist
    pub delete_segments: bool,

    /// Forward ffmpeg's stderr to ours
    pub inherit_stderr: bool,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            output_root: PathBuf::from("hls"),
            playlist_name: "index.m3u8".to_string(),
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            tune: "zerolatency".to_string(), // Low latency over quality
            audio_codec: "aac".to_string(),
            audio_sample_rate: 44100,
            segment_seconds: 2,
            playlist_size: 5,
            delete_segments: true,
            inherit_stderr: true,
        }
    }
}

impl TranscoderConfig {
    /// Set the ffmpeg executable
    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set the output root directory
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Set segment duration
    pub fn segment_seconds(mut self, seconds: u32) -> Self {
        self.segment_seconds = seconds.max(1);
        self
    }

    /// Set playlist length
    pub fn playlist_size(mut self, size: u32) -> Self {
        self.playlist_size = size;
        self
    }

    /// Keep segments that fall out of the playlist
    pub fn keep_segments(mut self) -> Self {
        self.delete_segments = false;
        self
    }

    /// Discard ffmpeg's stderr
    pub fn quiet(mut self) -> Self {
        self.inherit_stderr = false;
        self
    }

    /// ffmpeg arguments reading FLV from stdin and writing `playlist`
    pub fn ffmpeg_args(&self, playlist: &Path) -> Vec<OsString> {
        let sample_rate = self.audio_sample_rate.to_string();
        let segment_seconds = self.segment_seconds.to_string();
        let playlist_size = self.playlist_size.to_string();

        let mut args: Vec<OsString> = [
            "-y",
            "-i",
            "pipe:0",
            "-c:v",
            self.video_codec.as_str(),
            "-preset",
            self.preset.as_str(),
            "-tune",
            self.tune.as_str(),
            "-c:a",
            self.audio_codec.as_str(),
            "-ar",
            sample_rate.as_str(),
            "-f",
            "hls",
            "-hls_time",
            segment_seconds.as_str(),
            "-hls_list_size",
            playlist_size.as_str(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        if self.delete_segments {
            args.push("-hls_flags".into());
            args.push("delete_segments".into());
        }
        args.push(playlist.as_os_str().to_owned());
        args
    }
}
