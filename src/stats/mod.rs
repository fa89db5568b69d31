//! Statistics and metrics for ingest sessions

pub mod metrics;

pub use metrics::SessionStats;
