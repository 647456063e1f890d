//! Liveness sweep: machines that stay silent get dropped from the registry.
//!
//! Any contact counts — accepted data, a re-registered schema or a
//! heartbeat. The sweep only looks at the age recorded in the registry.

use std::sync::Arc;
use std::time::Duration;

use machbus_entity::Machine;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::registry::SchemaRegistry;

pub type LostCallback = Arc<dyn Fn(&Machine) + Send + Sync>;

/// Start the periodic eviction task. Machines silent for longer than
/// `timeout` are removed and reported through `on_lost`, once per loss.
/// A machine that re-registers later is simply a new registration.
pub fn spawn_sweeper(
    registry: SchemaRegistry,
    sweep_interval: Duration,
    timeout: Duration,
    on_lost: LostCallback,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            let lost = registry.evict_older_than(timeout);
            if lost.is_empty() {
                debug!(tracked = registry.len(), "sweep: all machines alive");
            }
            for machine in lost {
                warn!(%machine, "machine lost, schema evicted");
                on_lost(&machine);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::new_state;
    use machbus_entity::schema::units;
    use machbus_entity::{MachineSchema, MachineValueSpec, MachineValueType};

    fn press(serial: &str) -> Machine {
        Machine::new("acme", "press-4", serial)
    }

    fn press_schema(serial: &str) -> MachineSchema {
        let mut schema = MachineSchema::new(press(serial), "station-1", "site-1");
        schema.add_field(MachineValueSpec::new("cycles", MachineValueType::Long, units::NONE));
        schema
    }

    #[tokio::test]
    async fn silent_machines_are_evicted_and_reported() {
        let registry = SchemaRegistry::new();
        registry.put(press_schema("0001"));

        let lost = new_state(Vec::new());
        let lost_cb = lost.clone();
        let handle = spawn_sweeper(
            registry.clone(),
            Duration::from_millis(10),
            Duration::from_millis(25),
            Arc::new(move |machine| lost_cb.lock().push(machine.clone())),
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(registry.is_empty());
        assert_eq!(lost.lock().as_slice(), &[press("0001")]);
    }

    #[tokio::test]
    async fn contact_keeps_a_machine_alive() {
        let registry = SchemaRegistry::new();
        registry.put(press_schema("0001"));

        let handle = spawn_sweeper(
            registry.clone(),
            Duration::from_millis(10),
            Duration::from_millis(40),
            Arc::new(|_| {}),
        );

        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            assert!(registry.touch(&press("0001")));
        }
        handle.abort();

        assert!(registry.contains(&press("0001")));
    }
}
