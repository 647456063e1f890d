use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::data::MachineData;
use crate::schema::MachineSchema;

/// Milliseconds since the Unix epoch, the message timestamp format.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// A batch of machine data snapshots, the body of `POST /machine/data`.
///
/// Snapshots are applied in the order they appear here; the whole batch is
/// accepted or rejected as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMessage {
    pub time: i64,
    pub machines: Vec<MachineData>,
}

impl DataMessage {
    pub fn new() -> Self {
        Self { time: now_millis(), machines: Vec::new() }
    }

    pub fn at(time: i64) -> Self {
        Self { time, machines: Vec::new() }
    }

    pub fn push(&mut self, data: MachineData) {
        self.machines.push(data);
    }
}

impl Default for DataMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// A batch of machine schemas, the body of `POST /machine/schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMessage {
    pub time: i64,
    pub schemas: Vec<MachineSchema>,
}

impl SchemaMessage {
    pub fn new() -> Self {
        Self { time: now_millis(), schemas: Vec::new() }
    }

    pub fn push(&mut self, schema: MachineSchema) {
        self.schemas.push(schema);
    }
}

impl Default for SchemaMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<MachineSchema> for SchemaMessage {
    fn from_iter<I: IntoIterator<Item = MachineSchema>>(iter: I) -> Self {
        Self { time: now_millis(), schemas: iter.into_iter().collect() }
    }
}

/// Self-description served on `GET /server/info`: who the server is, which
/// encodings it accepts and how often machines are expected to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub heart_beat_interval: u64,
    pub content_types: Vec<String>,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, heart_beat_interval_ms: u64) -> Self {
        Self {
            name: name.into(),
            heart_beat_interval: heart_beat_interval_ms,
            content_types: Vec::new(),
        }
    }

    pub fn add_content_type(&mut self, mime: impl Into<String>) {
        self.content_types.push(mime.into());
    }
}
