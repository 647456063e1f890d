//! HTTP client for the telemetry server.
//!
//! The schema handshake is handled here: when the server answers a data
//! message with "schema needed", the client registers its schemas, gives
//! the server a moment to settle and resends the data once. Any other
//! rejection is surfaced to the caller.

use std::time::Duration;

use machbus_entity::codec::{self, ContentType, DecodeError, EncodeError};
use machbus_entity::status::ERR_SCHEMA_NEEDED;
use machbus_entity::{DataMessage, Machine, SchemaMessage, ServerInfo, Status};
use reqwest::header;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not encode message: {0}")]
    Encode(#[from] EncodeError),
    #[error("server answered with an unreadable body: {0}")]
    Decode(#[from] DecodeError),
    #[error("server rejected the message: {0}")]
    Rejected(Status),
}

impl ClientError {
    /// Protocol code of a rejection, if this is one.
    pub fn rejection_code(&self) -> Option<i32> {
        match self {
            ClientError::Rejected(status) => Some(status.code),
            _ => None,
        }
    }
}

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    content_type: ContentType,
    settle_delay: Duration,
}

impl RestClient {
    /// `base_url` is the server's service root, e.g.
    /// `http://localhost:8095/services/mid`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            content_type: ContentType::Json,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    async fn post_message(&self, path: &str, body: String) -> Result<Status, ClientError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(header::CONTENT_TYPE, self.content_type.as_mime())
            .header(header::ACCEPT, self.content_type.as_mime())
            .body(body)
            .send()
            .await?;
        // the protocol outcome is in the body, HTTP status is secondary
        let bytes = response.bytes().await?;
        Ok(codec::decode_status(&bytes, self.content_type)?)
    }

    /// Register the schemas of this agent's machines.
    pub async fn send_schemas(&self, msg: &SchemaMessage) -> Result<(), ClientError> {
        let body = codec::encode_schema_message(msg, self.content_type)?;
        let status = self.post_message("/machine/schema", body).await?;
        if status.is_ok() {
            debug!(schemas = msg.schemas.len(), "schemas registered");
            Ok(())
        } else {
            Err(ClientError::Rejected(status))
        }
    }

    /// Send a data message.
    ///
    /// If the server does not know the machines (for example after a server
    /// restart), `schemas` is registered and the data is resent once. The
    /// second rejection is final.
    pub async fn send_data(&self, msg: &DataMessage, schemas: &SchemaMessage) -> Result<(), ClientError> {
        let body = codec::encode_data_message(msg, self.content_type)?;

        let status = self.post_message("/machine/data", body.clone()).await?;
        if status.is_ok() {
            return Ok(());
        }
        if status.code != ERR_SCHEMA_NEEDED {
            return Err(ClientError::Rejected(status));
        }

        info!("server does not know our machines, registering schemas and retrying");
        self.send_schemas(schemas).await?;
        tokio::time::sleep(self.settle_delay).await;

        let status = self.post_message("/machine/data", body).await?;
        if status.is_ok() {
            Ok(())
        } else {
            Err(ClientError::Rejected(status))
        }
    }

    /// Signal that a machine is alive without sending data.
    pub async fn heartbeat(&self, machine: &Machine) -> Result<(), ClientError> {
        self.http
            .get(format!("{}/client_heart_beat", self.base_url))
            .query(&[
                ("vendor", machine.vendor.as_str()),
                ("id", machine.id.as_str()),
                ("serial_number", machine.serial_number.as_str()),
                ("uuid", machine.uuid.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Fetch the server's self-description.
    pub async fn server_info(&self) -> Result<ServerInfo, ClientError> {
        let response = self
            .http
            .get(format!("{}/server/info", self.base_url))
            .header(header::ACCEPT, ContentType::Json.as_mime())
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes).map_err(DecodeError::from)?)
    }
}
