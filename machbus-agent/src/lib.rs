//! machbus-agent - Client side of the machbus telemetry protocol
//!
//! [`client::RestClient`] talks to the server and transparently handles
//! the schema handshake; [`batch::DataBatch`] collects validated
//! snapshots before they go out. The binary in `main.rs` is a demo agent
//! reporting synthetic machine data.

pub mod batch;
pub mod client;
pub mod config;

pub use batch::DataBatch;
pub use client::{ClientError, RestClient};
pub use config::AgentConfig;
