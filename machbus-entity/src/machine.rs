use serde::{Deserialize, Serialize};

/// Identity of a physical machine.
///
/// The registry keys on the full tuple: two machines that differ only in
/// `uuid` are distinct entries. `uuid` is optional on the wire and defaults
/// to the empty string, but it still takes part in equality and hashing,
/// so it must be treated as a key field and not as an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Machine {
    /// Unique vendor identifier.
    pub vendor: String,
    /// Machine type identifier, unique per vendor.
    pub id: String,
    /// Serial number, unique per vendor and machine type.
    pub serial_number: String,
    /// Ontology UUID, empty when the machine is not registered in an ontology.
    #[serde(default)]
    pub uuid: String,
}

impl Machine {
    pub fn new(vendor: impl Into<String>, id: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            id: id.into(),
            serial_number: serial_number.into(),
            uuid: String::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }
}

impl std::fmt::Display for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vendor={}, machine={}, serial number=\"{}\", uuid=\"{}\"",
            self.vendor, self.id, self.serial_number, self.uuid
        )
    }
}
