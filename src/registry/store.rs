//! Stream registry implementation
//!
//! The registry is the single source of truth for stream lifecycle state,
//! shared by every ingest connection.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use super::entry::{Stream, StreamStatus};
use super::error::RegistryError;

/// Storage contract for stream aggregates
///
/// Lookups are copy-on-read: callers get a snapshot, and a mutation only
/// becomes visible to other readers once it is passed to [`save`].
///
/// [`save`]: StreamRepository::save
pub trait StreamRepository: Send + Sync + 'static {
    /// Look up a stream by its key
    fn find_by_key(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Stream, RegistryError>> + Send;

    /// Insert or replace a stream under its key
    fn save(&self, stream: &Stream) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Set the status of the stream with the given id
    fn update_status(
        &self,
        id: &str,
        status: StreamStatus,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

/// In-memory registry
///
/// A single map behind a `RwLock`: concurrent lookups proceed in parallel,
/// writes are exclusive. Stored values are never handed out by reference.
pub struct InMemoryStreamRegistry {
    streams: RwLock<HashMap<String, Stream>>,
}

impl InMemoryStreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Provision a stream before any connection uses it
    pub async fn seed(&self, stream: Stream) {
        tracing::info!(
            stream = %stream.stream_key(),
            id = %stream.id(),
            status = %stream.status(),
            "Stream provisioned"
        );
        self.streams
            .write()
            .await
            .insert(stream.stream_key().to_string(), stream);
    }

    /// Number of provisioned streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

impl Default for InMemoryStreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRepository for InMemoryStreamRegistry {
    async fn find_by_key(&self, key: &str) -> Result<Stream, RegistryError> {
        let streams = self.streams.read().await;
        streams
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::StreamNotFound(key.to_string()))
    }

    async fn save(&self, stream: &Stream) -> Result<(), RegistryError> {
        let mut streams = self.streams.write().await;
        streams.insert(stream.stream_key().to_string(), stream.clone());

        tracing::debug!(
            stream = %stream.stream_key(),
            status = %stream.status(),
            "Stream saved"
        );
        Ok(())
    }

    async fn update_status(&self, id: &str, status: StreamStatus) -> Result<(), RegistryError> {
        let mut streams = self.streams.write().await;
        let stream = streams
            .values_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| RegistryError::StreamNotFound(id.to_string()))?;

        stream.apply_status(status);

        tracing::debug!(stream = %stream.stream_key(), status = %status, "Stream status updated");
        Ok(())
    }
}
