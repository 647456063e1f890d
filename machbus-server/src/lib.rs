//! machbus-server - Telemetry ingestion server
//!
//! Machines announce a schema, then push data snapshots that are validated
//! against it; a background sweep evicts machines that fall silent. The
//! HTTP surface speaks the JSON/XML protocol from `machbus-entity`.

pub mod config;
pub mod http;
pub mod ingest;
pub mod monitor;
pub mod registry;
pub mod state;

pub use config::ServerConfig;
pub use http::AppState;
pub use ingest::{DataSink, IngestError, Ingestor, LogSink};
pub use registry::SchemaRegistry;
