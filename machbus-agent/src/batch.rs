//! Collects snapshots for the next report, validated at insert time so a
//! bad value fails loudly in the agent instead of poisoning a whole
//! message on the server.

use machbus_entity::{DataMessage, MachineData, MachineSchema, SchemaMessage, SchemaViolation};

#[derive(Debug, Default)]
pub struct DataBatch {
    entries: Vec<(MachineData, MachineSchema)>,
}

impl DataBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot together with the schema it must satisfy.
    pub fn push(&mut self, data: MachineData, schema: MachineSchema) -> Result<(), SchemaViolation> {
        schema.check_valid(&data)?;
        self.entries.push((data, schema));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The outgoing data message, stamped with the current time.
    pub fn data_message(&self) -> DataMessage {
        let mut msg = DataMessage::new();
        for (data, _) in &self.entries {
            msg.push(data.clone());
        }
        msg
    }

    /// The matching schema message for the handshake retry.
    pub fn schema_message(&self) -> SchemaMessage {
        self.entries.iter().map(|(_, schema)| schema.clone()).collect()
    }
}
