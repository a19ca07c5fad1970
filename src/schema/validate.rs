use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ValidationError, ValidationErrors};

use super::definition::{FieldEntry, Schema, ROOT_SEGMENT};
use super::field::{FieldType, FieldTypeTag, Validator};

// ============================================================================
// Regexes
// ============================================================================

fn iso_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,9})?(?:Z|[+-]\d{2}:\d{2})?$")
            .expect("ISO date regex is valid")
    })
}

/// Pattern for e-mail address fields (emailregex.com).
pub fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
        )
        .expect("email regex is valid")
    })
}

/// Ready-made validator for e-mail fields.
pub fn email_validator() -> Validator {
    Validator::Regex(email_regex().clone())
}

// ============================================================================
// Validation Context
// ============================================================================

struct ValidationContext {
    errors: Vec<ValidationError>,
    path: Vec<String>,
}

impl ValidationContext {
    fn new() -> Self {
        Self {
            errors: vec![],
            path: vec![],
        }
    }

    fn push(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }

    fn pop(&mut self) {
        self.path.pop();
    }

    fn add_error(&mut self, expected: impl Into<String>, received: impl Into<String>) {
        self.errors.push(ValidationError {
            path: self.path.join("."),
            expected: expected.into(),
            received: received.into(),
        });
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn entry_key(entry: &FieldEntry) -> String {
    if entry.segment == ROOT_SEGMENT {
        entry.key.clone()
    } else {
        entry.wire_path()
    }
}

// ============================================================================
// Checks
// ============================================================================

/// JavaScript-style truthiness: null, false, 0 and "" are missing.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        _ => false,
    }
}

/// Valid ISO 8601 timestamp (regex shape + chrono semantic check).
pub fn is_valid_iso_date(s: &str) -> bool {
    if !iso_date_regex().is_match(s) {
        return false;
    }
    let has_offset = s.ends_with('Z') || s[10..].contains('+') || s[10..].contains('-');
    let normalised = if has_offset {
        s.to_string()
    } else {
        format!("{s}Z")
    };
    chrono::DateTime::parse_from_rfc3339(&normalised).is_ok()
}

/// Does `value` have the JSON shape of a single (non-array) value of `tag`?
pub fn matches_type(tag: FieldTypeTag, value: &Value) -> bool {
    match tag {
        FieldTypeTag::Boolean => value.is_boolean(),
        FieldTypeTag::Integer | FieldTypeTag::Enum => is_integer(value),
        FieldTypeTag::Float => value.is_number(),
        FieldTypeTag::String => value.is_string(),
        FieldTypeTag::Date => match value {
            Value::Null => true,
            Value::String(s) => is_valid_iso_date(s),
            _ => false,
        },
        FieldTypeTag::Reference => value.is_null() || value.is_string(),
        FieldTypeTag::SubRecordArray => value.is_array(),
        FieldTypeTag::Object => value.is_object(),
    }
}

fn run_validator(validator: &Validator, value: &Value, is_array: bool, ctx: &mut ValidationContext) {
    match validator {
        Validator::Required => {
            if !is_present(value) {
                ctx.add_error("required value", type_name(value));
            }
        }
        Validator::Enum(table) => {
            let known = value.as_i64().map(|v| table.contains_key(&v)).unwrap_or(false);
            if !known {
                ctx.add_error("enum value", value.to_string());
            }
        }
        Validator::Type(tag) => {
            let ok = if is_array {
                value
                    .as_array()
                    .map(|items| items.iter().all(|v| matches_type(*tag, v)))
                    .unwrap_or(false)
            } else {
                matches_type(*tag, value)
            };
            if !ok {
                let expected = if is_array {
                    format!("array of {tag}")
                } else {
                    tag.to_string()
                };
                ctx.add_error(expected, type_name(value));
            }
        }
        Validator::Regex(re) => match value.as_str() {
            Some(s) if re.is_match(s) => {}
            Some(_) => ctx.add_error(format!("match for /{}/", re.as_str()), value.to_string()),
            None => ctx.add_error("string", type_name(value)),
        },
    }
}

fn walk(schema: &Schema, payload: &[Value], ctx: &mut ValidationContext) {
    if payload.len() != schema.len() {
        ctx.add_error(
            format!("payload of {} fields", schema.len()),
            format!("{} fields", payload.len()),
        );
        return;
    }

    for (entry, value) in schema.fields().iter().zip(payload) {
        ctx.push(entry_key(entry));

        for validator in entry.desc.validators() {
            run_validator(validator, value, entry.desc.is_array(), ctx);
        }

        if let FieldType::SubRecordArray(sub_schema) = entry.desc.field_type() {
            match value.as_array() {
                None => ctx.add_error("array of sub-records", type_name(value)),
                Some(children) => {
                    for (position, child) in children.iter().enumerate() {
                        ctx.push(position.to_string());
                        match child.as_array() {
                            Some(child_payload) => walk(sub_schema, child_payload, ctx),
                            None => ctx.add_error("sub-record payload", type_name(child)),
                        }
                        ctx.pop();
                    }
                }
            }
        }

        ctx.pop();
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Run every field validator over `payload`, recursing into sub-records.
pub fn validate_payload(schema: &Schema, payload: &[Value]) -> Result<(), ValidationErrors> {
    let mut ctx = ValidationContext::new();
    walk(schema, payload, &mut ctx);
    if ctx.errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(ctx.errors))
    }
}
