//! In-process capture transcoder
//!
//! Stands in for a real transcoder: the sink is one half of an in-memory
//! duplex pipe and a reader task collects the container bytes per stream.
//! End of input plays the role of process exit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::sync::{oneshot, Notify};

use crate::error::Result;
use crate::registry::StreamKey;

use super::{SinkExit, TranscodeSink, Transcoder};

struct Capture {
    generation: usize,
    data: BytesMut,
    finished: bool,
}

#[derive(Default)]
struct CaptureState {
    captures: Mutex<HashMap<String, Capture>>,
    finished: Notify,
    starts: AtomicUsize,
}

/// Transcoder that records what it is sent
#[derive(Clone)]
pub struct CaptureTranscoder {
    pipe_capacity: usize,
    state: Arc<CaptureState>,
}

impl CaptureTranscoder {
    pub fn new() -> Self {
        Self::with_pipe_capacity(64 * 1024)
    }

    /// Capacity of the in-memory pipe; a small value makes back-pressure visible
    pub fn with_pipe_capacity(pipe_capacity: usize) -> Self {
        Self {
            pipe_capacity: pipe_capacity.max(1),
            state: Arc::new(CaptureState::default()),
        }
    }

    /// Number of sinks started so far
    pub fn start_count(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    /// Bytes received so far for `key`
    pub fn captured(&self, key: &str) -> Option<Bytes> {
        let captures = self.state.captures.lock().unwrap_or_else(|e| e.into_inner());
        captures
            .get(key)
            .map(|c| Bytes::copy_from_slice(&c.data))
    }

    /// Whether the sink for `key` has seen end of input
    pub fn is_finished(&self, key: &str) -> bool {
        let captures = self.state.captures.lock().unwrap_or_else(|e| e.into_inner());
        captures.get(key).is_some_and(|c| c.finished)
    }

    /// Wait until the sink for `key` sees end of input, then return its bytes
    pub async fn wait_finished(&self, key: &str) -> Bytes {
        loop {
            let notified = self.state.finished.notified();
            if self.is_finished(key) {
                return self.captured(key).unwrap_or_default();
            }
            notified.await;
        }
    }
}

impl Default for CaptureTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for CaptureTranscoder {
    async fn start(&self, key: &StreamKey) -> Result<TranscodeSink> {
        let (input, mut output) = tokio::io::duplex(self.pipe_capacity);
        let (exit_tx, exit_rx) = oneshot::channel();
        let stream_key = key.to_string();

        // A restarted key gets a fresh capture; readers of older sinks stop
        // contributing to it.
        let generation = self.state.starts.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut captures = self.state.captures.lock().unwrap_or_else(|e| e.into_inner());
            captures.insert(
                stream_key.clone(),
                Capture {
                    generation,
                    data: BytesMut::new(),
                    finished: false,
                },
            );
        }

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut chunk = vec![0u8; 8 * 1024];
            let detail = loop {
                match output.read(&mut chunk).await {
                    Ok(0) => break None,
                    Ok(n) => {
                        let mut captures = state.captures.lock().unwrap_or_else(|e| e.into_inner());
                        if let Some(capture) = captures
                            .get_mut(&stream_key)
                            .filter(|c| c.generation == generation)
                        {
                            capture.data.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) => break Some(e.to_string()),
                }
            };

            {
                let mut captures = state.captures.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(capture) = captures
                    .get_mut(&stream_key)
                    .filter(|c| c.generation == generation)
                {
                    capture.finished = true;
                }
            }
            state.finished.notify_waiters();

            tracing::debug!(stream = %stream_key, "Capture sink reached end of input");

            let _ = exit_tx.send(SinkExit {
                stream_key,
                success: detail.is_none(),
                code: None,
                detail,
            });
        });

        Ok(TranscodeSink {
            input: Box::new(input),
            exit: exit_rx,
        })
    }
}
