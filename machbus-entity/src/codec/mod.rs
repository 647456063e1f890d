//! Wire codec for the REST transport.
//!
//! Encoding is a free function per (entity kind, content type) pair; the
//! entity types themselves know nothing about formats. JSON goes through
//! serde directly, XML through the hand-rolled reader/writer in [`xml`]
//! because the XML shape (entry lists, optional array levels, scalar
//! autodetection) does not map onto serde.

mod xml;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::data::MachineData;
use crate::message::{DataMessage, SchemaMessage, ServerInfo};
use crate::status::Status;

/// Body encodings understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Xml,
}

impl ContentType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
        }
    }

    /// Parse a MIME string, ignoring parameters after `;`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence {
            "application/json" => Some(ContentType::Json),
            "application/xml" => Some(ContentType::Xml),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_mime())
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid XML: {0}")]
    Xml(String),
    #[error("message is missing \"{0}\"")]
    MissingElement(String),
    #[error("unexpected value for \"{element}\": {reason}")]
    BadElement { element: String, reason: String },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML encoding failed: {0}")]
    Xml(String),
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(body)?)
}

pub fn encode_data_message(msg: &DataMessage, content_type: ContentType) -> Result<String, EncodeError> {
    match content_type {
        ContentType::Json => Ok(serde_json::to_string(msg)?),
        ContentType::Xml => xml::write_data_message(msg),
    }
}

pub fn decode_data_message(body: &[u8], content_type: ContentType) -> Result<DataMessage, DecodeError> {
    match content_type {
        ContentType::Json => decode_json(body),
        ContentType::Xml => xml::read_data_message(body),
    }
}

pub fn encode_schema_message(msg: &SchemaMessage, content_type: ContentType) -> Result<String, EncodeError> {
    match content_type {
        ContentType::Json => Ok(serde_json::to_string(msg)?),
        ContentType::Xml => xml::write_schema_message(msg),
    }
}

pub fn decode_schema_message(body: &[u8], content_type: ContentType) -> Result<SchemaMessage, DecodeError> {
    match content_type {
        ContentType::Json => decode_json(body),
        ContentType::Xml => xml::read_schema_message(body),
    }
}

pub fn encode_status(status: &Status, content_type: ContentType) -> Result<String, EncodeError> {
    match content_type {
        ContentType::Json => Ok(serde_json::to_string(status)?),
        ContentType::Xml => xml::write_status(status),
    }
}

pub fn decode_status(body: &[u8], content_type: ContentType) -> Result<Status, DecodeError> {
    match content_type {
        ContentType::Json => decode_json(body),
        ContentType::Xml => xml::read_status(body),
    }
}

pub fn encode_server_info(info: &ServerInfo, content_type: ContentType) -> Result<String, EncodeError> {
    match content_type {
        ContentType::Json => Ok(serde_json::to_string(info)?),
        ContentType::Xml => xml::write_server_info(info),
    }
}

/// Decode a single machine data snapshot, used by tests and tooling.
pub fn decode_machine_data(body: &[u8], content_type: ContentType) -> Result<MachineData, DecodeError> {
    match content_type {
        ContentType::Json => decode_json(body),
        ContentType::Xml => xml::read_machine_data_document(body),
    }
}
