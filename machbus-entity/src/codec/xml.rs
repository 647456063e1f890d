//! XML transport encoding.
//!
//! The format predates this implementation and is kept bit-compatible with
//! deployed senders: identities and names travel in CDATA, scalars as bare
//! element text, and collections with a single element may omit the list
//! level entirely. Decoding therefore goes through a generic XML-to-JSON
//! tree conversion with scalar autodetection, mirroring what legacy
//! receivers did, and the typed readers below stay lenient about strings
//! that arrived looking like numbers.

use std::collections::HashMap;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use super::{DecodeError, EncodeError};
use crate::data::MachineData;
use crate::machine::Machine;
use crate::message::{DataMessage, SchemaMessage, ServerInfo};
use crate::schema::{MachineSchema, MachineValueSpec, Visualization, VisualizationLevel};
use crate::status::Status;
use crate::value::{MachineValue, MachineValueType};

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

type XmlWriter = Writer<Vec<u8>>;

fn enc<E: std::fmt::Display>(e: E) -> EncodeError {
    EncodeError::Xml(e.to_string())
}

fn open(w: &mut XmlWriter, tag: &str) -> Result<(), EncodeError> {
    w.write_event(Event::Start(BytesStart::new(tag))).map_err(enc)
}

fn close(w: &mut XmlWriter, tag: &str) -> Result<(), EncodeError> {
    w.write_event(Event::End(BytesEnd::new(tag))).map_err(enc)
}

fn text_el(w: &mut XmlWriter, tag: &str, text: &str) -> Result<(), EncodeError> {
    open(w, tag)?;
    w.write_event(Event::Text(BytesText::new(text))).map_err(enc)?;
    close(w, tag)
}

fn cdata_el(w: &mut XmlWriter, tag: &str, text: &str) -> Result<(), EncodeError> {
    open(w, tag)?;
    w.write_event(Event::CData(BytesCData::new(text))).map_err(enc)?;
    close(w, tag)
}

/// Render a double so it survives the scalar autodetection on the other
/// side: without a decimal point a `2.0` would come back as a long.
fn fmt_double(v: f64) -> String {
    let mut s = v.to_string();
    if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
        s.push_str(".0");
    }
    s
}

fn write_machine_fields(w: &mut XmlWriter, machine: &Machine) -> Result<(), EncodeError> {
    text_el(w, "vendor", &machine.vendor)?;
    text_el(w, "id", &machine.id)?;
    cdata_el(w, "serial_number", &machine.serial_number)?;
    cdata_el(w, "uuid", &machine.uuid)
}

fn write_status_fields(w: &mut XmlWriter, status: &Status) -> Result<(), EncodeError> {
    open(w, "status")?;
    text_el(w, "code", &status.code.to_string())?;
    cdata_el(w, "description", &status.description)?;
    close(w, "status")
}

fn write_machine_data(w: &mut XmlWriter, data: &MachineData) -> Result<(), EncodeError> {
    open(w, "machine")?;
    write_machine_fields(w, &data.machine)?;
    open(w, "data")?;
    for (name, value) in &data.data {
        open(w, "entry")?;
        cdata_el(w, "name", name)?;
        match value {
            MachineValue::Text(text) => cdata_el(w, "value", text)?,
            MachineValue::Double(v) => text_el(w, "value", &fmt_double(*v))?,
            other => text_el(w, "value", &other.to_string())?,
        }
        close(w, "entry")?;
    }
    close(w, "data")?;
    write_status_fields(w, &data.status)?;
    close(w, "machine")
}

fn finish(w: XmlWriter) -> Result<String, EncodeError> {
    String::from_utf8(w.into_inner()).map_err(enc)
}

pub fn write_data_message(msg: &DataMessage) -> Result<String, EncodeError> {
    let mut w = Writer::new(Vec::new());
    open(&mut w, "data_message")?;
    text_el(&mut w, "time", &msg.time.to_string())?;
    open(&mut w, "machines")?;
    for data in &msg.machines {
        write_machine_data(&mut w, data)?;
    }
    close(&mut w, "machines")?;
    close(&mut w, "data_message")?;
    finish(w)
}

fn write_spec(w: &mut XmlWriter, spec: &MachineValueSpec) -> Result<(), EncodeError> {
    open(w, "specification")?;
    cdata_el(w, "name", &spec.name)?;
    text_el(w, "type", spec.value_type.identifier())?;
    cdata_el(w, "unit", &spec.unit)?;
    cdata_el(w, "visualization_type", wire_name(&spec.visualization)?.as_str())?;
    cdata_el(w, "visualization_level", wire_name(&spec.level)?.as_str())?;
    close(w, "specification")
}

/// Wire name of a unit enum as serde sees it, without duplicating the
/// rename table here.
fn wire_name<T: serde::Serialize>(value: &T) -> Result<String, EncodeError> {
    match serde_json::to_value(value)? {
        Value::String(s) => Ok(s),
        other => Err(EncodeError::Xml(format!("expected string-like enum, got {other}"))),
    }
}

fn write_schema(w: &mut XmlWriter, schema: &MachineSchema) -> Result<(), EncodeError> {
    open(w, "machine")?;
    write_machine_fields(w, &schema.machine)?;
    text_el(w, "station_id", &schema.station_id)?;
    text_el(w, "site_id", &schema.site_id)?;
    cdata_el(w, "site_uuid", &schema.site_uuid)?;
    open(w, "schema")?;
    for spec in schema.fields.values() {
        write_spec(w, spec)?;
    }
    close(w, "schema")?;
    close(w, "machine")
}

pub fn write_schema_message(msg: &SchemaMessage) -> Result<String, EncodeError> {
    let mut w = Writer::new(Vec::new());
    open(&mut w, "schema_message")?;
    text_el(&mut w, "time", &msg.time.to_string())?;
    open(&mut w, "schemas")?;
    for schema in &msg.schemas {
        write_schema(&mut w, schema)?;
    }
    close(&mut w, "schemas")?;
    close(&mut w, "schema_message")?;
    finish(w)
}

pub fn write_status(status: &Status) -> Result<String, EncodeError> {
    let mut w = Writer::new(Vec::new());
    write_status_fields(&mut w, status)?;
    finish(w)
}

pub fn write_server_info(info: &ServerInfo) -> Result<String, EncodeError> {
    let mut w = Writer::new(Vec::new());
    open(&mut w, "server_info")?;
    cdata_el(&mut w, "name", &info.name)?;
    text_el(&mut w, "heart_beat_interval", &info.heart_beat_interval.to_string())?;
    open(&mut w, "content_types")?;
    for mime in &info.content_types {
        cdata_el(&mut w, "entry", mime)?;
    }
    close(&mut w, "content_types")?;
    close(&mut w, "server_info")?;
    finish(w)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn xml_err<E: std::fmt::Display>(e: E) -> DecodeError {
    DecodeError::Xml(e.to_string())
}

/// Autodetect an element's scalar text.
///
/// Longs must round-trip exactly ("0001" stays a string), doubles only need
/// a decimal point or exponent. This is the detection legacy receivers
/// applied, so serial numbers with leading zeros keep working.
fn scalar(text: &str) -> Value {
    if text.is_empty() {
        return Value::String(String::new());
    }
    let initial = text.as_bytes()[0];
    if initial.is_ascii_digit() || initial == b'-' {
        if text.contains('.') || text.contains('e') || text.contains('E') || text == "-0" {
            if let Ok(v) = text.parse::<f64>() {
                if let Some(n) = serde_json::Number::from_f64(v) {
                    return Value::Number(n);
                }
            }
        } else if let Ok(v) = text.parse::<i64>() {
            if v.to_string() == text {
                return Value::Number(v.into());
            }
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

fn insert_child(parent: &mut Map<String, Value>, tag: String, value: Value) {
    match parent.get_mut(&tag) {
        None => {
            parent.insert(tag, value);
        }
        Some(Value::Array(list)) => list.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Convert an XML document into a JSON-shaped tree: elements become
/// objects, repeated sibling tags become arrays, leaf text goes through
/// [`scalar`]. Attributes are not part of the wire format and are ignored.
fn xml_to_value(xml: &str) -> Result<Value, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // (tag, child elements, accumulated text) per open element
    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push((tag, Map::new(), String::new()));
            }
            Event::Empty(start) => {
                let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                match stack.last_mut() {
                    Some((_, children, _)) => insert_child(children, tag, Value::String(String::new())),
                    None => root = Some((tag, Value::String(String::new()))),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_err)?;
                if let Some((_, _, buffer)) = stack.last_mut() {
                    buffer.push_str(&text);
                }
            }
            Event::CData(cdata) => {
                let bytes = cdata.into_inner();
                let text = std::str::from_utf8(&bytes).map_err(xml_err)?;
                if let Some((_, _, buffer)) = stack.last_mut() {
                    buffer.push_str(text);
                }
            }
            Event::End(_) => {
                let (tag, children, text) = stack
                    .pop()
                    .ok_or_else(|| DecodeError::Xml("unbalanced closing tag".into()))?;
                let value = if children.is_empty() { scalar(text.trim()) } else { Value::Object(children) };
                match stack.last_mut() {
                    Some((_, parent, _)) => insert_child(parent, tag, value),
                    None => root = Some((tag, value)),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::Xml("document ended with open elements".into()));
    }
    let (tag, value) = root.ok_or_else(|| DecodeError::Xml("empty document".into()))?;
    let mut doc = Map::new();
    doc.insert(tag, value);
    Ok(Value::Object(doc))
}

fn missing(element: &str) -> DecodeError {
    DecodeError::MissingElement(element.to_string())
}

fn bad(element: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::BadElement { element: element.to_string(), reason: reason.into() }
}

fn as_object<'a>(value: &'a Value, element: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value.as_object().ok_or_else(|| bad(element, "expected an element with children"))
}

/// One element or many: single-element collections have no array level.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(list) => list.iter().collect(),
        other => vec![other],
    }
}

/// Leaf text, tolerating values the autodetection turned into numbers
/// or booleans.
fn get_string(map: &Map<String, Value>, key: &str) -> Result<String, DecodeError> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(bad(key, format!("expected text, got {other}"))),
        None => Err(missing(key)),
    }
}

fn get_string_or_default(map: &Map<String, Value>, key: &str) -> String {
    get_string(map, key).unwrap_or_default()
}

fn get_i64(map: &Map<String, Value>, key: &str) -> Result<i64, DecodeError> {
    match map.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| bad(key, "number out of range")),
        Some(other) => Err(bad(key, format!("expected a number, got {other}"))),
        None => Err(missing(key)),
    }
}

fn machine_value(value: &Value, element: &str) -> Result<MachineValue, DecodeError> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(v) => Ok(MachineValue::Long(v)),
            None => n
                .as_f64()
                .map(MachineValue::Double)
                .ok_or_else(|| bad(element, "number out of range")),
        },
        Value::Bool(b) => Ok(MachineValue::Bool(*b)),
        Value::String(s) => Ok(MachineValue::Text(s.clone())),
        other => Err(bad(element, format!("expected a scalar, got {other}"))),
    }
}

fn read_machine(map: &Map<String, Value>) -> Result<Machine, DecodeError> {
    Ok(Machine {
        vendor: get_string(map, "vendor")?,
        id: get_string(map, "id")?,
        serial_number: get_string(map, "serial_number")?,
        uuid: get_string_or_default(map, "uuid"),
    })
}

fn read_status_element(value: Option<&Value>) -> Result<Status, DecodeError> {
    let Some(value) = value else { return Ok(Status::default()) };
    let map = as_object(value, "status")?;
    Ok(Status {
        code: get_i64(map, "code")? as i32,
        description: get_string_or_default(map, "description"),
    })
}

fn read_machine_data(value: &Value) -> Result<MachineData, DecodeError> {
    let map = as_object(value, "machine")?;
    let mut data = MachineData::new(read_machine(map)?);

    if let Some(entries) = map.get("data").and_then(Value::as_object).and_then(|d| d.get("entry")) {
        for entry in as_list(entries) {
            let entry = as_object(entry, "entry")?;
            let name = get_string(entry, "name")?;
            let value = entry.get("value").ok_or_else(|| missing("value"))?;
            data.data.insert(name, machine_value(value, "value")?);
        }
    }

    data.status = read_status_element(map.get("status"))?;
    Ok(data)
}

pub fn read_data_message(body: &[u8]) -> Result<DataMessage, DecodeError> {
    let doc = xml_to_value(std::str::from_utf8(body).map_err(xml_err)?)?;
    let root = doc.get("data_message").ok_or_else(|| missing("data_message"))?;
    let root = as_object(root, "data_message")?;

    let mut msg = DataMessage::at(get_i64(root, "time")?);
    if let Some(machines) = root.get("machines").and_then(Value::as_object).and_then(|m| m.get("machine")) {
        for machine in as_list(machines) {
            msg.push(read_machine_data(machine)?);
        }
    }
    Ok(msg)
}

pub fn read_machine_data_document(body: &[u8]) -> Result<MachineData, DecodeError> {
    let doc = xml_to_value(std::str::from_utf8(body).map_err(xml_err)?)?;
    let root = doc.get("machine").ok_or_else(|| missing("machine"))?;
    read_machine_data(root)
}

fn enum_from_wire<T: serde::de::DeserializeOwned>(name: String, element: &str) -> Result<T, DecodeError> {
    serde_json::from_value(Value::String(name)).map_err(|e| bad(element, e.to_string()))
}

fn read_spec(value: &Value) -> Result<MachineValueSpec, DecodeError> {
    let map = as_object(value, "specification")?;
    let type_name = get_string(map, "type")?;
    let value_type = MachineValueType::from_identifier(&type_name)
        .ok_or_else(|| bad("type", format!("\"{type_name}\" is not a machine value type")))?;

    let visualization = match map.get("visualization_type") {
        Some(_) => enum_from_wire::<Visualization>(get_string(map, "visualization_type")?, "visualization_type")?,
        None => Visualization::default(),
    };
    let level = match map.get("visualization_level") {
        Some(_) => enum_from_wire::<VisualizationLevel>(get_string(map, "visualization_level")?, "visualization_level")?,
        None => VisualizationLevel::default(),
    };

    Ok(MachineValueSpec {
        name: get_string(map, "name")?,
        value_type,
        unit: get_string_or_default(map, "unit"),
        visualization,
        level,
    })
}

fn read_schema(value: &Value) -> Result<MachineSchema, DecodeError> {
    let map = as_object(value, "machine")?;
    let mut fields = HashMap::new();
    if let Some(specs) = map.get("schema").and_then(Value::as_object).and_then(|s| s.get("specification")) {
        for spec in as_list(specs) {
            let spec = read_spec(spec)?;
            fields.insert(spec.name.clone(), spec);
        }
    }

    Ok(MachineSchema {
        machine: read_machine(map)?,
        station_id: get_string(map, "station_id")?,
        site_id: get_string(map, "site_id")?,
        site_uuid: get_string_or_default(map, "site_uuid"),
        fields,
    })
}

pub fn read_schema_message(body: &[u8]) -> Result<SchemaMessage, DecodeError> {
    let doc = xml_to_value(std::str::from_utf8(body).map_err(xml_err)?)?;
    let root = doc.get("schema_message").ok_or_else(|| missing("schema_message"))?;
    let root = as_object(root, "schema_message")?;

    let mut msg = SchemaMessage { time: get_i64(root, "time")?, schemas: Vec::new() };
    if let Some(schemas) = root.get("schemas").and_then(Value::as_object).and_then(|s| s.get("machine")) {
        for schema in as_list(schemas) {
            msg.push(read_schema(schema)?);
        }
    }
    Ok(msg)
}

pub fn read_status(body: &[u8]) -> Result<Status, DecodeError> {
    let doc = xml_to_value(std::str::from_utf8(body).map_err(xml_err)?)?;
    let root = doc.get("status").ok_or_else(|| missing("status"))?;
    let map = as_object(root, "status")?;
    Ok(Status {
        code: get_i64(map, "code")? as i32,
        description: get_string_or_default(map, "description"),
    })
}
