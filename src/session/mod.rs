//! Ingest sessions
//!
//! One session per publisher connection. The protocol layer raises
//! [`IngestEvent`]s; the session turns them into lifecycle transitions and
//! container bytes for the transcoder.

pub mod context;
pub mod event;
pub mod state;

pub use context::SessionContext;
pub use event::IngestEvent;
pub use state::{IngestSession, SessionPhase};
