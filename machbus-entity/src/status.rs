use serde::{Deserialize, Serialize};

/// Well-known protocol status codes.
///
/// Changing these values breaks wire compatibility with deployed agents.
pub const OK: i32 = 0;
/// Received message could not be decoded.
pub const ERR_INVALID_MESSAGE: i32 = -1;
/// No schema is registered for this machine; the schema must be sent first.
pub const ERR_SCHEMA_NEEDED: i32 = -4;
/// Data does not match the registered schema; re-registration is required
/// if the schema has changed.
pub const ERR_SCHEMA_MISMATCH: i32 = -5;
/// Something went wrong on server side.
pub const ERR_INTERNAL: i32 = -6;

/// Protocol-level outcome reported in every response body.
///
/// Machines also embed a `Status` in their data snapshots; there a negative
/// code is an error state reported by the machine itself and has nothing to
/// do with the protocol codes above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: i32,
    #[serde(default)]
    pub description: String,
}

impl Status {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self { code, description: description.into() }
    }

    pub fn ok(description: impl Into<String>) -> Self {
        Self::new(OK, description)
    }

    pub fn is_ok(&self) -> bool {
        self.code == OK
    }
}

impl Default for Status {
    fn default() -> Self {
        Self { code: OK, description: String::new() }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status code {}: {}", self.code, self.description)
    }
}
