use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::machine::Machine;
use crate::status::Status;
use crate::value::MachineValue;

/// One reported state vector of a machine: a set of named typed values plus
/// the status the machine controller attached to the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineData {
    #[serde(flatten)]
    pub machine: Machine,
    #[serde(default)]
    pub data: HashMap<String, MachineValue>,
    #[serde(default)]
    pub status: Status,
}

impl MachineData {
    pub fn new(machine: Machine) -> Self {
        Self { machine, data: HashMap::new(), status: Status::default() }
    }

    pub fn with_status(machine: Machine, code: i32, description: impl Into<String>) -> Self {
        Self { machine, data: HashMap::new(), status: Status::new(code, description) }
    }

    /// Add or replace a value in the state vector.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<MachineValue>) {
        self.data.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&MachineValue> {
        self.data.get(name)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
