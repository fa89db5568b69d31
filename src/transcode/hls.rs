//! ffmpeg HLS transcoder
//!
//! Spawns one ffmpeg process per published stream, reading FLV from stdin
//! and writing an HLS playlist plus segments under `<root>/<key>/`.

use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::registry::StreamKey;

use super::config::TranscoderConfig;
use super::{SinkExit, TranscodeSink, Transcoder};

/// Transcoder backed by an ffmpeg subprocess
#[derive(Debug, Clone, Default)]
pub struct HlsTranscoder {
    config: TranscoderConfig,
}

impl HlsTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }
}

impl Transcoder for HlsTranscoder {
    async fn start(&self, key: &StreamKey) -> Result<TranscodeSink> {
        let output_dir = self.config.output_root.join(key.file_stem());
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            Error::SinkUnavailable(format!(
                "failed to create {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        let playlist = output_dir.join(&self.config.playlist_name);
        let stderr = if self.config.inherit_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(self.config.ffmpeg_args(&playlist))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|e| Error::SinkUnavailable(format!("failed to start ffmpeg: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::SinkUnavailable("ffmpeg stdin was not captured".into()))?;

        tracing::info!(
            stream = %key,
            pid = ?child.id(),
            playlist = %playlist.display(),
            "Transcoder started"
        );

        let (exit_tx, exit_rx) = oneshot::channel();
        let stream_key = key.to_string();

        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => SinkExit {
                    stream_key,
                    success: status.success(),
                    code: status.code(),
                    detail: None,
                },
                Err(e) => SinkExit {
                    stream_key,
                    success: false,
                    code: None,
                    detail: Some(e.to_string()),
                },
            };

            tracing::info!(
                stream = %exit.stream_key,
                success = exit.success,
                code = ?exit.code,
                "Transcoder process finished"
            );

            // Nobody listening is fine: the session may already be gone
            let _ = exit_tx.send(exit);
        });

        Ok(TranscodeSink {
            input: Box::new(stdin),
            exit: exit_rx,
        })
    }
}
