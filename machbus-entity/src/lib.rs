//! machbus-entity - Shared data model for the machbus telemetry pipeline
//!
//! Everything the server and the agent exchange lives here: machine
//! identities, value schemas, data snapshots, the message envelopes and the
//! JSON/XML wire codec. The model is plain data; format conversion is kept
//! out of the types and lives in [`codec`].

pub mod codec;
pub mod data;
pub mod machine;
pub mod message;
pub mod schema;
pub mod status;
pub mod value;

pub use codec::{ContentType, DecodeError, EncodeError};
pub use data::MachineData;
pub use machine::Machine;
pub use message::{DataMessage, SchemaMessage, ServerInfo};
pub use schema::{MachineSchema, MachineValueSpec, SchemaViolation, Visualization, VisualizationLevel};
pub use status::Status;
pub use value::{MachineValue, MachineValueType};
