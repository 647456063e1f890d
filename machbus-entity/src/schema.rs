use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::MachineData;
use crate::machine::Machine;
use crate::value::MachineValueType;

/// How a dashboard is expected to render a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visualization {
    #[default]
    #[serde(rename = "text_field")]
    TextField,
    #[serde(rename = "percent_bar")]
    PercentBar,
    #[serde(rename = "on_off")]
    OnOffLight,
}

/// At which zoom level a value is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationLevel {
    Overview,
    #[default]
    Detail,
    Never,
}

/// Common unit spellings, to keep agents consistent on the wire.
pub mod units {
    pub const NONE: &str = "";
    pub const CELSIUS: &str = "°C";
    pub const KELVIN: &str = "K";
    pub const METRE: &str = "m";
    pub const SECOND: &str = "s";
    pub const VOLT: &str = "V";
    pub const AMPERE: &str = "A";
    pub const WATT: &str = "W";
    pub const BAR: &str = "bar";
    pub const MILLI_BAR: &str = "mbar";
    pub const PERCENT: &str = "%";
}

/// Declaration of one field of a machine's state vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineValueSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: MachineValueType,
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "visualization_type", default)]
    pub visualization: Visualization,
    #[serde(rename = "visualization_level", default)]
    pub level: VisualizationLevel,
}

impl MachineValueSpec {
    pub fn new(name: impl Into<String>, value_type: MachineValueType, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type,
            unit: unit.into(),
            visualization: Visualization::default(),
            level: VisualizationLevel::default(),
        }
    }

    pub fn with_visualization(mut self, visualization: Visualization, level: VisualizationLevel) -> Self {
        self.visualization = visualization;
        self.level = level;
        self
    }
}

/// Why a data snapshot was rejected against a schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("machine of data and schema differ")]
    MachineDiffers,
    #[error("data contains extra key \"{0}\"")]
    UnknownField(String),
    #[error("value for \"{field}\" is of type {actual} but type {expected} was expected")]
    TypeMismatch {
        field: String,
        expected: MachineValueType,
        actual: MachineValueType,
    },
    #[error("data is missing schema fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// The registered shape of a machine's telemetry: which fields exist and
/// which type each carries. Unique by field name; order is irrelevant.
///
/// On the JSON wire the field set is an array under `"schema"`; in memory it
/// is a map keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSchema {
    #[serde(flatten)]
    pub machine: Machine,
    pub station_id: String,
    pub site_id: String,
    #[serde(default)]
    pub site_uuid: String,
    #[serde(rename = "schema", with = "field_list")]
    pub fields: HashMap<String, MachineValueSpec>,
}

impl MachineSchema {
    pub fn new(machine: Machine, station_id: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            machine,
            station_id: station_id.into(),
            site_id: site_id.into(),
            site_uuid: String::new(),
            fields: HashMap::new(),
        }
    }

    pub fn with_site_uuid(mut self, site_uuid: impl Into<String>) -> Self {
        self.site_uuid = site_uuid.into();
        self
    }

    /// Add a field declaration, replacing any existing one with the same name.
    pub fn add_field(&mut self, spec: MachineValueSpec) {
        self.fields.insert(spec.name.clone(), spec);
    }

    pub fn field(&self, name: &str) -> Option<&MachineValueSpec> {
        self.fields.get(name)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Check a data snapshot against this schema.
    ///
    /// Valid means: the data belongs to this schema's machine, every reported
    /// key is declared, and every value carries the declared type. Fields that
    /// are declared but not reported are fine here; see
    /// [`MachineSchema::check_valid_and_complete`] for the stricter variant.
    pub fn check_valid(&self, data: &MachineData) -> Result<(), SchemaViolation> {
        if data.machine != self.machine {
            return Err(SchemaViolation::MachineDiffers);
        }

        for (name, value) in &data.data {
            let spec = self
                .fields
                .get(name)
                .ok_or_else(|| SchemaViolation::UnknownField(name.clone()))?;
            let actual = value.value_type();
            if actual != spec.value_type {
                return Err(SchemaViolation::TypeMismatch {
                    field: name.clone(),
                    expected: spec.value_type,
                    actual,
                });
            }
        }

        Ok(())
    }

    pub fn is_valid(&self, data: &MachineData) -> bool {
        self.check_valid(data).is_ok()
    }

    /// Like [`MachineSchema::check_valid`], but additionally requires every
    /// declared field to be present in the snapshot.
    pub fn check_valid_and_complete(&self, data: &MachineData) -> Result<(), SchemaViolation> {
        self.check_valid(data)?;

        if data.len() != self.fields.len() {
            let mut missing: Vec<String> = self
                .fields
                .keys()
                .filter(|name| data.get(name).is_none())
                .cloned()
                .collect();
            missing.sort();
            return Err(SchemaViolation::MissingFields(missing));
        }

        Ok(())
    }
}

/// Serialize the field map as the wire-level list of specifications and
/// rebuild the map (keyed by spec name) on decode.
mod field_list {
    use super::MachineValueSpec;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S>(fields: &HashMap<String, MachineValueSpec>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(fields.len()))?;
        for spec in fields.values() {
            seq.serialize_element(spec)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, MachineValueSpec>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let specs = Vec::<MachineValueSpec>::deserialize(deserializer)?;
        Ok(specs.into_iter().map(|spec| (spec.name.clone(), spec)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MachineValue;

    fn press_schema() -> MachineSchema {
        let machine = Machine::new("acme", "press-4", "0001");
        let mut schema = MachineSchema::new(machine, "station-1", "site-1");
        schema.add_field(MachineValueSpec::new("temperature", MachineValueType::Double, units::CELSIUS));
        schema.add_field(MachineValueSpec::new("cycles", MachineValueType::Long, units::NONE));
        schema.add_field(MachineValueSpec::new("running", MachineValueType::Bool, units::NONE));
        schema.add_field(MachineValueSpec::new("comment", MachineValueType::Text, units::NONE));
        schema
    }

    fn matching_data() -> MachineData {
        let mut data = MachineData::new(Machine::new("acme", "press-4", "0001"));
        data.put("temperature", 81.4);
        data.put("cycles", 42i64);
        data.put("running", true);
        data
    }

    #[test]
    fn matching_snapshot_is_valid() {
        assert_eq!(press_schema().check_valid(&matching_data()), Ok(()));
    }

    #[test]
    fn extra_key_is_rejected() {
        let mut data = matching_data();
        data.put("pressure", 1013.0);
        assert_eq!(
            press_schema().check_valid(&data),
            Err(SchemaViolation::UnknownField("pressure".into()))
        );
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut data = matching_data();
        data.put("cycles", MachineValue::Text("42".into()));
        assert_eq!(
            press_schema().check_valid(&data),
            Err(SchemaViolation::TypeMismatch {
                field: "cycles".into(),
                expected: MachineValueType::Long,
                actual: MachineValueType::Text,
            })
        );
    }

    #[test]
    fn foreign_machine_is_rejected() {
        let schema = press_schema();
        let data = MachineData::new(Machine::new("acme", "press-4", "0002"));
        assert_eq!(schema.check_valid(&data), Err(SchemaViolation::MachineDiffers));
    }

    #[test]
    fn completeness_is_a_separate_check() {
        let schema = press_schema();
        let mut data = matching_data();

        // valid, but "comment" is missing
        assert!(schema.check_valid(&data).is_ok());
        assert_eq!(
            schema.check_valid_and_complete(&data),
            Err(SchemaViolation::MissingFields(vec!["comment".into()]))
        );

        data.put("comment", "all good");
        assert_eq!(schema.check_valid_and_complete(&data), Ok(()));
    }

    #[test]
    fn add_field_replaces_by_name() {
        let mut schema = press_schema();
        schema.add_field(MachineValueSpec::new("cycles", MachineValueType::Double, units::NONE));
        assert_eq!(schema.field_count(), 4);
        assert_eq!(schema.field("cycles").unwrap().value_type, MachineValueType::Double);
    }
}
