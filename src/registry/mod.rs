//! Stream registry
//!
//! Keyed store of stream aggregates, shared by every ingest connection.
//!
//! ```text
//!                 Arc<InMemoryStreamRegistry>
//!              ┌────────────────────────────┐
//!              │ streams: RwLock<HashMap<   │
//!              │   key, Stream { status,    │
//!              │     started_at, .. } >>    │
//!              └─────────────┬──────────────┘
//!                            │
//!          find_by_key ──► snapshot (clone)
//!                            │  go_live() / stop()
//!          save ◄────────────┘
//! ```
//!
//! Readers never hold a reference into the map, so a caller mutating its
//! snapshot cannot race other sessions. Making the change visible is an
//! explicit `save`.

pub mod entry;
pub mod error;
pub mod key;
pub mod store;

pub use entry::{Stream, StreamStatus};
pub use error::{RegistryError, StreamError};
pub use key::StreamKey;
pub use store::{InMemoryStreamRegistry, StreamRepository};
