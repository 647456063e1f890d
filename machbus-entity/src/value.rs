use serde::{Deserialize, Serialize};

/// Type tag of a machine value, as announced by a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineValueType {
    Double,
    Long,
    Bool,
    #[serde(rename = "string")]
    Text,
}

impl MachineValueType {
    /// Wire identifier used in JSON and XML representations.
    pub fn identifier(&self) -> &'static str {
        match self {
            MachineValueType::Double => "double",
            MachineValueType::Long => "long",
            MachineValueType::Bool => "bool",
            MachineValueType::Text => "string",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "double" => Some(MachineValueType::Double),
            "long" => Some(MachineValueType::Long),
            "bool" => Some(MachineValueType::Bool),
            "string" => Some(MachineValueType::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for MachineValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// One reported value of a machine state vector.
///
/// On the wire this is a bare JSON scalar; the untagged representation
/// recovers the type from the scalar itself. `Long` must stay declared
/// before `Double` so integers are not widened during decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MachineValue {
    Long(i64),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl MachineValue {
    pub fn value_type(&self) -> MachineValueType {
        match self {
            MachineValue::Double(_) => MachineValueType::Double,
            MachineValue::Long(_) => MachineValueType::Long,
            MachineValue::Bool(_) => MachineValueType::Bool,
            MachineValue::Text(_) => MachineValueType::Text,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            MachineValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            MachineValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MachineValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MachineValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for MachineValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineValue::Double(v) => write!(f, "{v}"),
            MachineValue::Long(v) => write!(f, "{v}"),
            MachineValue::Bool(v) => write!(f, "{v}"),
            MachineValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for MachineValue {
    fn from(v: f64) -> Self {
        MachineValue::Double(v)
    }
}

impl From<i64> for MachineValue {
    fn from(v: i64) -> Self {
        MachineValue::Long(v)
    }
}

impl From<bool> for MachineValue {
    fn from(v: bool) -> Self {
        MachineValue::Bool(v)
    }
}

impl From<&str> for MachineValue {
    fn from(v: &str) -> Self {
        MachineValue::Text(v.to_string())
    }
}

impl From<String> for MachineValue {
    fn from(v: String) -> Self {
        MachineValue::Text(v)
    }
}
