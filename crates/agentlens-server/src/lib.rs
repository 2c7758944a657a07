//! agentlens server library
//!
//! Ingestion, event notification, and the tokio-native line-protocol
//! listener that exposes them for local testing.

pub mod constants;
pub mod events;
pub mod ingest;
pub mod protocol;
pub mod server;

pub use constants::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT, LISTEN_ADDR_ENV, REWRITE_STALE_SPANS_ENV};
pub use events::{EventBus, EventRecord, EventStatus};
pub use ingest::{ingest_spans, parse_log_stream, sanitize_service_name};
pub use protocol::{Request, Response};
