//! REST surface of the server.
//!
//! All routes live under the configured base path. Message bodies are
//! negotiated per request: the `Content-Type` header selects how the body
//! is decoded, the first entry of `Accept` selects the response encoding
//! and falls back to the request encoding.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use machbus_entity::codec::{self, ContentType};
use machbus_entity::status::ERR_INVALID_MESSAGE;
use machbus_entity::{Machine, ServerInfo, Status};
use serde::Deserialize;
use tracing::{debug, error};

use crate::ingest::{IngestError, Ingestor};
use crate::registry::SchemaRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: SchemaRegistry,
    pub ingestor: Ingestor,
    pub info: ServerInfo,
}

pub fn build_router(app_state: AppState, base_path: &str) -> Router {
    let api = Router::new()
        .route("/machine/data", post(post_machine_data))
        .route("/machine/schema", post(post_machine_schema))
        .route("/client_heart_beat", get(client_heart_beat))
        .route("/server/info", get(server_info))
        .with_state(app_state);

    if base_path.is_empty() || base_path == "/" {
        api
    } else {
        Router::new().nest(base_path, api)
    }
}

fn header_mime(headers: &HeaderMap, name: header::HeaderName) -> Option<ContentType> {
    let value = headers.get(name)?.to_str().ok()?;
    // Accept may list alternatives; only the first entry counts
    ContentType::from_mime(value.split(',').next().unwrap_or(""))
}

fn request_type(headers: &HeaderMap) -> ContentType {
    header_mime(headers, header::CONTENT_TYPE).unwrap_or(ContentType::Json)
}

fn response_type(headers: &HeaderMap) -> ContentType {
    header_mime(headers, header::ACCEPT).unwrap_or_else(|| request_type(headers))
}

fn http_status(err: &IngestError) -> StatusCode {
    match err {
        IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Encode a protocol status response. An encoding failure degrades to a
/// plain-text 500 so the sender always gets an answer.
fn reply(content_type: ContentType, code: StatusCode, status: &Status) -> Response {
    match codec::encode_status(status, content_type) {
        Ok(body) => (code, [(header::CONTENT_TYPE, content_type.as_mime())], body).into_response(),
        Err(e) => {
            error!("failed to encode status response: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, status.to_string()).into_response()
        }
    }
}

// POST {base}/machine/data
async fn post_machine_data(State(app): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let resp_type = response_type(&headers);

    let outcome = codec::decode_data_message(&body, request_type(&headers))
        .map_err(|e| IngestError::InvalidMessage(e.to_string()))
        .and_then(|msg| app.ingestor.ingest_data(&msg));

    match outcome {
        Ok(()) => reply(resp_type, StatusCode::CREATED, &Status::ok("Data stored.")),
        Err(e) => {
            debug!("data message rejected: {e}");
            reply(resp_type, http_status(&e), &e.status())
        }
    }
}

// POST {base}/machine/schema
async fn post_machine_schema(State(app): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let resp_type = response_type(&headers);

    match codec::decode_schema_message(&body, request_type(&headers)) {
        Ok(msg) => {
            app.ingestor.ingest_schemas(&msg);
            reply(resp_type, StatusCode::CREATED, &Status::ok("Schemas stored."))
        }
        Err(e) => {
            debug!("schema message rejected: {e}");
            reply(
                resp_type,
                StatusCode::BAD_REQUEST,
                &Status::new(ERR_INVALID_MESSAGE, format!("invalid message: {e}")),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeartbeatParams {
    vendor: String,
    id: String,
    serial_number: String,
    #[serde(default)]
    uuid: String,
}

// GET {base}/client_heart_beat
//
// Deliberately permissive: a heartbeat from an unregistered machine is
// answered 200 as well, the machine just is not refreshed. The identity
// must match in full, including the uuid.
async fn client_heart_beat(State(app): State<AppState>, Query(params): Query<HeartbeatParams>) -> StatusCode {
    let machine = Machine {
        vendor: params.vendor,
        id: params.id,
        serial_number: params.serial_number,
        uuid: params.uuid,
    };
    if app.registry.touch(&machine) {
        debug!(%machine, "heartbeat");
    } else {
        debug!(%machine, "heartbeat from unregistered machine");
    }
    StatusCode::OK
}

// GET {base}/server/info
async fn server_info(State(app): State<AppState>, headers: HeaderMap) -> Response {
    let resp_type = response_type(&headers);
    match codec::encode_server_info(&app.info, resp_type) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, resp_type.as_mime())], body).into_response(),
        Err(e) => {
            error!("failed to encode server info: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::LogSink;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use machbus_entity::schema::units;
    use machbus_entity::status::{ERR_SCHEMA_MISMATCH, ERR_SCHEMA_NEEDED};
    use machbus_entity::{
        DataMessage, MachineData, MachineSchema, MachineValueSpec, MachineValueType, SchemaMessage,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const BASE: &str = "/services/mid";

    fn test_app() -> (SchemaRegistry, Router) {
        let registry = SchemaRegistry::new();
        let ingestor = Ingestor::new(registry.clone(), Arc::new(LogSink));
        let mut info = ServerInfo::new("machbus-server test", 30_000);
        info.add_content_type(ContentType::Json.as_mime());
        info.add_content_type(ContentType::Xml.as_mime());
        let router = build_router(AppState { registry: registry.clone(), ingestor, info }, BASE);
        (registry, router)
    }

    fn press(serial: &str) -> Machine {
        Machine::new("acme", "press-4", serial)
    }

    fn press_schema(serial: &str) -> MachineSchema {
        let mut schema = MachineSchema::new(press(serial), "station-1", "site-1");
        schema.add_field(MachineValueSpec::new("temperature", MachineValueType::Double, units::CELSIUS));
        schema.add_field(MachineValueSpec::new("cycles", MachineValueType::Long, units::NONE));
        schema
    }

    fn press_data(serial: &str) -> MachineData {
        let mut data = MachineData::new(press(serial));
        data.put("temperature", 81.5);
        data.put("cycles", 42i64);
        data
    }

    fn data_body(ct: ContentType) -> String {
        let mut msg = DataMessage::new();
        msg.push(press_data("0001"));
        codec::encode_data_message(&msg, ct).unwrap()
    }

    fn schema_body(ct: ContentType) -> String {
        let mut msg = SchemaMessage::new();
        msg.push(press_schema("0001"));
        codec::encode_schema_message(&msg, ct).unwrap()
    }

    async fn send_post(app: &Router, path: &str, ct: ContentType, body: String) -> (StatusCode, Status) {
        let request = Request::post(format!("{BASE}{path}"))
            .header(header::CONTENT_TYPE, ct.as_mime())
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let code = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (code, codec::decode_status(&bytes, ct).unwrap())
    }

    #[tokio::test]
    async fn data_without_schema_is_schema_needed() {
        let (_, app) = test_app();
        let (code, status) = send_post(&app, "/machine/data", ContentType::Json, data_body(ContentType::Json)).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(status.code, ERR_SCHEMA_NEEDED);
        assert!(status.description.contains("press-4"));
    }

    #[tokio::test]
    async fn schema_then_data_is_accepted() {
        let (registry, app) = test_app();

        let (code, status) = send_post(&app, "/machine/schema", ContentType::Json, schema_body(ContentType::Json)).await;
        assert_eq!(code, StatusCode::CREATED);
        assert!(status.is_ok());
        assert!(registry.contains(&press("0001")));

        let (code, status) = send_post(&app, "/machine/data", ContentType::Json, data_body(ContentType::Json)).await;
        assert_eq!(code, StatusCode::CREATED);
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn xml_bodies_work_end_to_end() {
        let (_, app) = test_app();

        let (code, _) = send_post(&app, "/machine/schema", ContentType::Xml, schema_body(ContentType::Xml)).await;
        assert_eq!(code, StatusCode::CREATED);

        let (code, status) = send_post(&app, "/machine/data", ContentType::Xml, data_body(ContentType::Xml)).await;
        assert_eq!(code, StatusCode::CREATED);
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn mismatching_data_is_rejected() {
        let (registry, app) = test_app();
        registry.put(press_schema("0001"));

        let mut data = press_data("0001");
        data.put("cycles", "not a number");
        let mut msg = DataMessage::new();
        msg.push(data);
        let body = codec::encode_data_message(&msg, ContentType::Json).unwrap();

        let (code, status) = send_post(&app, "/machine/data", ContentType::Json, body).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(status.code, ERR_SCHEMA_MISMATCH);
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_message() {
        let (_, app) = test_app();
        let (code, status) = send_post(&app, "/machine/data", ContentType::Json, "{not json".into()).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(status.code, ERR_INVALID_MESSAGE);
    }

    #[tokio::test]
    async fn accept_header_selects_the_response_encoding() {
        let (_, app) = test_app();
        let request = Request::post(format!("{BASE}/machine/data"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/xml, application/json")
            .body(Body::from(data_body(ContentType::Json)))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let status = codec::decode_status(&bytes, ContentType::Xml).unwrap();
        assert_eq!(status.code, ERR_SCHEMA_NEEDED);
    }

    #[tokio::test]
    async fn heartbeat_refreshes_only_the_exact_identity() {
        let (registry, app) = test_app();
        let mut schema = press_schema("0001");
        schema.machine.uuid = "0d9f39c2".into();
        registry.put(schema);
        let machine = press("0001").with_uuid("0d9f39c2");

        tokio::time::sleep(Duration::from_millis(20)).await;

        // wrong uuid: answered 200 but not refreshed
        let request = Request::get(format!(
            "{BASE}/client_heart_beat?vendor=acme&id=press-4&serial_number=0001&uuid=other"
        ))
        .body(Body::empty())
        .unwrap();
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);
        assert!(registry.last_seen_age(&machine).unwrap() >= Duration::from_millis(20));

        let request = Request::get(format!(
            "{BASE}/client_heart_beat?vendor=acme&id=press-4&serial_number=0001&uuid=0d9f39c2"
        ))
        .body(Body::empty())
        .unwrap();
        assert_eq!(app.oneshot(request).await.unwrap().status(), StatusCode::OK);
        assert!(registry.last_seen_age(&machine).unwrap() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn server_info_is_served_in_the_requested_encoding() {
        let (_, app) = test_app();
        let request = Request::get(format!("{BASE}/server/info"))
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let info: ServerInfo = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(info.heart_beat_interval, 30_000);
        assert!(info.content_types.contains(&"application/xml".to_string()));
    }

    #[tokio::test]
    async fn routes_outside_the_base_path_do_not_exist() {
        let (_, app) = test_app();
        let request = Request::get("/server/info").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(request).await.unwrap().status(), StatusCode::NOT_FOUND);
    }
}
