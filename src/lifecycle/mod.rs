//! Stream lifecycle use cases
//!
//! The only path that changes a stream's lifecycle status. Each operation is
//! `find_by_key`, an aggregate transition, then `save`, run inside a per-key
//! lock so two publishers racing for the same key cannot both go live.

mod locks;

use std::sync::Arc;

use crate::error::Result;
use crate::registry::{Stream, StreamRepository};

use locks::KeyLocks;

/// Start/stop use cases over a stream repository
pub struct StreamLifecycle<R> {
    repo: Arc<R>,
    locks: KeyLocks,
}

impl<R: StreamRepository> StreamLifecycle<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            locks: KeyLocks::new(),
        }
    }

    /// The underlying repository
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Take a provisioned stream live
    ///
    /// Unknown keys are not auto-provisioned. Returns the saved snapshot.
    pub async fn start_stream(&self, key: &str) -> Result<Stream> {
        let _guard = self.locks.lock(key).await;

        let mut stream = self.repo.find_by_key(key).await?;
        stream.go_live()?;
        self.repo.save(&stream).await?;

        tracing::info!(
            stream = %key,
            id = %stream.id(),
            viewers = stream.viewer_count,
            "Stream is now live"
        );
        Ok(stream)
    }

    /// Return a stream to idle. Idempotent.
    pub async fn stop_stream(&self, key: &str) -> Result<Stream> {
        let _guard = self.locks.lock(key).await;

        let mut stream = self.repo.find_by_key(key).await?;
        let was_live = stream.is_live();
        stream.stop();
        self.repo.save(&stream).await?;

        if was_live {
            tracing::info!(stream = %key, id = %stream.id(), "Stream stopped");
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::registry::{InMemoryStreamRegistry, StreamStatus};

    async fn seeded() -> StreamLifecycle<InMemoryStreamRegistry> {
        let registry = Arc::new(InMemoryStreamRegistry::new());
        registry.seed(Stream::new("stream-1", "demo")).await;
        StreamLifecycle::new(registry)
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let lifecycle = seeded().await;

        let live = lifecycle.start_stream("demo").await.unwrap();
        assert!(live.is_live());

        let stopped = lifecycle.stop_stream("demo").await.unwrap();
        assert_eq!(stopped.status(), StreamStatus::Idle);
        assert!(stopped.started_at().is_none());

        // Can go live again after a stop
        lifecycle.start_stream("demo").await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let lifecycle = seeded().await;
        let first = lifecycle.stop_stream("demo").await.unwrap();
        let second = lifecycle.stop_stream("demo").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stop_unknown_key() {
        let lifecycle = seeded().await;
        let result = lifecycle.stop_stream("nope").await;
        assert!(matches!(result, Err(Error::StreamNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_single_winner() {
        let lifecycle = Arc::new(seeded().await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let lifecycle = Arc::clone(&lifecycle);
            handles.push(tokio::spawn(async move {
                lifecycle.start_stream("demo").await
            }));
        }

        let mut ok = 0;
        let mut already_live = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(Error::AlreadyLive(_)) => already_live += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(already_live, 15);
    }
}
