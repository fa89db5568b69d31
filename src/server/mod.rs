//! Ingest server
//!
//! Owns the shared registry and transcoder and runs one task per
//! connection.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::ConnectionHandle;
pub use listener::IngestServer;
