//! Acceptance of incoming messages against the schema registry.
//!
//! A data message is one unit: either every snapshot in it validates
//! against its registered schema, or the whole message is rejected with
//! the first failure and nothing reaches the sink.

use std::sync::Arc;

use machbus_entity::status::{ERR_INTERNAL, ERR_INVALID_MESSAGE, ERR_SCHEMA_MISMATCH, ERR_SCHEMA_NEEDED};
use machbus_entity::{DataMessage, Machine, MachineData, SchemaMessage, Status};
use thiserror::Error;
use tracing::{debug, info};

use crate::registry::SchemaRegistry;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("schema of machine \"{0}\" not found")]
    SchemaNeeded(Machine),
    #[error("data does not match the registered schema: {0}")]
    SchemaMismatch(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn code(&self) -> i32 {
        match self {
            IngestError::InvalidMessage(_) => ERR_INVALID_MESSAGE,
            IngestError::SchemaNeeded(_) => ERR_SCHEMA_NEEDED,
            IngestError::SchemaMismatch(_) => ERR_SCHEMA_MISMATCH,
            IngestError::Internal(_) => ERR_INTERNAL,
        }
    }

    /// The protocol status carried back to the sender.
    pub fn status(&self) -> Status {
        Status::new(self.code(), self.to_string())
    }
}

/// Where accepted snapshots go.
pub trait DataSink: Send + Sync {
    fn accept(&self, data: &MachineData);
}

/// Default sink: log the snapshot and drop it.
pub struct LogSink;

impl DataSink for LogSink {
    fn accept(&self, data: &MachineData) {
        info!(machine = %data.machine, values = data.len(), status = data.status.code, "accepted data");
    }
}

#[derive(Clone)]
pub struct Ingestor {
    registry: SchemaRegistry,
    sink: Arc<dyn DataSink>,
}

impl Ingestor {
    pub fn new(registry: SchemaRegistry, sink: Arc<dyn DataSink>) -> Self {
        Self { registry, sink }
    }

    /// Validate and accept a data message.
    ///
    /// Validation runs over the whole message before anything is applied;
    /// the first missing schema or schema violation rejects the message.
    /// On success every reported machine counts as seen and each snapshot
    /// is handed to the sink in message order.
    pub fn ingest_data(&self, msg: &DataMessage) -> Result<(), IngestError> {
        for data in &msg.machines {
            let schema = self
                .registry
                .get(&data.machine)
                .ok_or_else(|| IngestError::SchemaNeeded(data.machine.clone()))?;
            schema
                .check_valid(data)
                .map_err(|violation| IngestError::SchemaMismatch(violation.to_string()))?;
        }

        for data in &msg.machines {
            self.registry.touch(&data.machine);
            self.sink.accept(data);
        }
        Ok(())
    }

    /// Register every schema in the message, replacing existing ones.
    pub fn ingest_schemas(&self, msg: &SchemaMessage) {
        for schema in &msg.schemas {
            debug!(machine = %schema.machine, fields = schema.field_count(), "registering schema");
            self.registry.put(schema.clone());
        }
    }
}
