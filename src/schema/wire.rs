//! Conversion between wire documents (`{segment: {key: value}}`) and the
//! flat positional payload.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::SchemaError;

use super::definition::Schema;
use super::field::{FieldDesc, FieldType};
use super::validate::is_valid_iso_date;

const MAX_DEPTH: usize = 100;

fn invalid(field: &str, expected: &str, value: &Value) -> SchemaError {
    SchemaError::InvalidWireValue {
        field: field.to_string(),
        expected: expected.to_string(),
        received: value.to_string(),
    }
}

fn date_from_wire(field: &str, value: &Value) -> Result<Value, SchemaError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) if is_valid_iso_date(s) => {
            let with_zone = if s.ends_with('Z') || s[10..].contains('+') || s[10..].contains('-') {
                s.clone()
            } else {
                format!("{s}Z")
            };
            let parsed = DateTime::parse_from_rfc3339(&with_zone)
                .map_err(|_| invalid(field, "ISO 8601 date", value))?;
            Ok(Value::String(
                parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ))
        }
        Value::Number(n) => {
            let millis = n.as_i64().ok_or_else(|| invalid(field, "epoch millis", value))?;
            let parsed = DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| invalid(field, "epoch millis", value))?;
            Ok(Value::String(
                parsed.to_rfc3339_opts(SecondsFormat::Millis, true),
            ))
        }
        _ => Err(invalid(field, "ISO 8601 date", value)),
    }
}

impl FieldDesc {
    fn element_to_wire(&self, value: &Value, depth: usize) -> Result<Value, SchemaError> {
        match self.field_type() {
            FieldType::SubRecordArray(schema) => match value.as_array() {
                Some(payload) => schema.to_document_at(payload, depth + 1),
                None => Err(invalid(self.label(), "sub-record payload", value)),
            },
            _ => Ok(value.clone()),
        }
    }

    fn element_from_wire(&self, value: &Value, depth: usize) -> Result<Value, SchemaError> {
        match self.field_type() {
            FieldType::SubRecordArray(schema) => {
                Ok(Value::Array(schema.from_document_at(value, depth + 1)?))
            }
            FieldType::Date => date_from_wire(self.label(), value),
            _ => Ok(value.clone()),
        }
    }

    /// Convert a payload value of this field to its wire form.
    pub fn to_wire(&self, value: &Value) -> Result<Value, SchemaError> {
        self.to_wire_at(value, 0)
    }

    /// Convert a wire value of this field to its payload form.
    pub fn from_wire(&self, value: &Value) -> Result<Value, SchemaError> {
        self.from_wire_at(value, 0)
    }

    fn to_wire_at(&self, value: &Value, depth: usize) -> Result<Value, SchemaError> {
        if !self.is_array() {
            return self.element_to_wire(value, depth);
        }
        let items = value
            .as_array()
            .ok_or_else(|| invalid(self.label(), "array", value))?;
        items
            .iter()
            .map(|item| self.element_to_wire(item, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn from_wire_at(&self, value: &Value, depth: usize) -> Result<Value, SchemaError> {
        if !self.is_array() {
            return self.element_from_wire(value, depth);
        }
        if value.is_null() {
            return Ok(Value::Array(Vec::new()));
        }
        let items = value
            .as_array()
            .ok_or_else(|| invalid(self.label(), "array", value))?;
        items
            .iter()
            .map(|item| self.element_from_wire(item, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

impl Schema {
    /// Build a `{segment: {key: value}}` document from a payload.
    pub fn payload_to_document(&self, payload: &[Value]) -> Result<Value, SchemaError> {
        self.to_document_at(payload, 0)
    }

    /// Build a payload from a document; missing segments and keys take defaults.
    pub fn document_to_payload(&self, document: &Value) -> Result<Vec<Value>, SchemaError> {
        self.from_document_at(document, 0)
    }

    fn to_document_at(&self, payload: &[Value], depth: usize) -> Result<Value, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::InvalidSchema(format!(
                "Maximum document depth exceeded ({MAX_DEPTH})"
            )));
        }
        self.check_payload_len(payload)?;

        let mut document = Map::new();
        for (entry, value) in self.fields().iter().zip(payload) {
            let segment = document
                .entry(entry.segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(segment) = segment {
                segment.insert(entry.key.clone(), entry.desc.to_wire_at(value, depth)?);
            }
        }
        Ok(Value::Object(document))
    }

    fn from_document_at(&self, document: &Value, depth: usize) -> Result<Vec<Value>, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::InvalidSchema(format!(
                "Maximum document depth exceeded ({MAX_DEPTH})"
            )));
        }
        let document = document
            .as_object()
            .ok_or_else(|| invalid(self.ident(), "document object", document))?;

        let mut payload = self.default_payload();
        for (slot, entry) in payload.iter_mut().zip(self.fields()) {
            let value = document
                .get(&entry.segment)
                .and_then(Value::as_object)
                .and_then(|segment| segment.get(&entry.key));
            if let Some(value) = value {
                *slot = entry.desc.from_wire_at(value, depth)?;
            }
        }
        Ok(payload)
    }
}
