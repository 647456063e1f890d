//! The schema registry: which machines are known, what their telemetry
//! looks like, and when each was last heard from.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use machbus_entity::{Machine, MachineSchema};

use crate::state::{new_state, Shared};

#[derive(Debug, Clone)]
struct SchemaRecord {
    schema: MachineSchema,
    last_seen: Instant,
}

/// Registered machines keyed by their full compound identity (vendor, id,
/// serial number, uuid). Cheap to clone; all clones share the same map.
#[derive(Clone)]
pub struct SchemaRegistry {
    records: Shared<HashMap<Machine, SchemaRecord>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self { records: new_state(HashMap::new()) }
    }

    /// Register a schema, replacing any previous one for the same machine.
    /// Registration counts as contact.
    pub fn put(&self, schema: MachineSchema) {
        let machine = schema.machine.clone();
        self.records.lock().insert(machine, SchemaRecord { schema, last_seen: Instant::now() });
    }

    pub fn get(&self, machine: &Machine) -> Option<MachineSchema> {
        self.records.lock().get(machine).map(|r| r.schema.clone())
    }

    pub fn contains(&self, machine: &Machine) -> bool {
        self.records.lock().contains_key(machine)
    }

    /// Record contact with a machine. Returns false if the machine is not
    /// registered; unknown machines are never implicitly created.
    pub fn touch(&self, machine: &Machine) -> bool {
        match self.records.lock().get_mut(machine) {
            Some(record) => {
                record.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, machine: &Machine) -> Option<MachineSchema> {
        self.records.lock().remove(machine).map(|r| r.schema)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<MachineSchema> {
        self.records.lock().values().map(|r| r.schema.clone()).collect()
    }

    /// Time since the machine was last heard from.
    pub fn last_seen_age(&self, machine: &Machine) -> Option<Duration> {
        self.records.lock().get(machine).map(|r| r.last_seen.elapsed())
    }

    /// Drop every machine that has been silent longer than `max_age` and
    /// return the evicted identities.
    pub fn evict_older_than(&self, max_age: Duration) -> Vec<Machine> {
        let mut records = self.records.lock();
        let lost: Vec<Machine> = records
            .iter()
            .filter(|(_, r)| r.last_seen.elapsed() > max_age)
            .map(|(m, _)| m.clone())
            .collect();
        for machine in &lost {
            records.remove(machine);
        }
        lost
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
