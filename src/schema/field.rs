//! Field descriptors: a closed union of field types plus the per-field
//! validators, defaults and option tables a schema carries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::definition::Schema;

// ============================================================================
// Field Identity
// ============================================================================

/// Process-unique field identifier, assigned when a schema is built.
///
/// Unlike the positional index, a `FieldId` never collides across nested
/// schemas, so it is what filters use as their map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub(crate) u32);

impl FieldId {
    pub fn get(self) -> u32 {
        self.0
    }
}

// ============================================================================
// Field Types
// ============================================================================

/// Enum value table: stored integer → display label.
pub type EnumTable = BTreeMap<i64, String>;

/// Payload-free field type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldTypeTag {
    Boolean,
    Integer,
    Float,
    String,
    Date,
    Enum,
    Reference,
    SubRecordArray,
    Object,
}

impl fmt::Display for FieldTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldTypeTag::Boolean => "boolean",
            FieldTypeTag::Integer => "integer",
            FieldTypeTag::Float => "float",
            FieldTypeTag::String => "string",
            FieldTypeTag::Date => "date",
            FieldTypeTag::Enum => "enum",
            FieldTypeTag::Reference => "reference",
            FieldTypeTag::SubRecordArray => "sub-record array",
            FieldTypeTag::Object => "object",
        };
        f.write_str(name)
    }
}

/// Field type with its tag-specific payload.
#[derive(Debug, Clone)]
pub enum FieldType {
    Boolean,
    Integer,
    Float,
    String,
    Date,
    Enum(EnumTable),
    Reference { target: String },
    SubRecordArray(Arc<Schema>),
    Object,
}

impl FieldType {
    pub fn tag(&self) -> FieldTypeTag {
        match self {
            FieldType::Boolean => FieldTypeTag::Boolean,
            FieldType::Integer => FieldTypeTag::Integer,
            FieldType::Float => FieldTypeTag::Float,
            FieldType::String => FieldTypeTag::String,
            FieldType::Date => FieldTypeTag::Date,
            FieldType::Enum(_) => FieldTypeTag::Enum,
            FieldType::Reference { .. } => FieldTypeTag::Reference,
            FieldType::SubRecordArray(_) => FieldTypeTag::SubRecordArray,
            FieldType::Object => FieldTypeTag::Object,
        }
    }
}

// ============================================================================
// Validators
// ============================================================================

/// Per-field value check. Validators are data; `schema::validate` runs them.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Value must be truthy (not null, false, 0 or "").
    Required,
    /// Value must be a key of the enum table.
    Enum(EnumTable),
    /// Value must have the JSON shape of the given field type.
    Type(FieldTypeTag),
    /// String value must match the pattern.
    Regex(Regex),
}

/// A selectable option for select-style string fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

// ============================================================================
// FieldDesc
// ============================================================================

/// Description of a single field: its type, array-ness and validators.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    label: String,
    field_type: FieldType,
    is_array: bool,
    validators: Vec<Validator>,
    options: Vec<SelectOption>,
}

impl FieldDesc {
    fn with_type(label: impl Into<String>, field_type: FieldType, is_array: bool) -> Self {
        Self {
            label: label.into(),
            field_type,
            is_array,
            validators: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn string(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::String, false)
    }

    pub fn string_array(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::String, true)
    }

    /// Multiline text; identical to `string` at the data level.
    pub fn multiline(label: impl Into<String>) -> Self {
        Self::string(label)
    }

    pub fn select<K, L>(label: impl Into<String>, options: impl IntoIterator<Item = (K, L)>) -> Self
    where
        K: Into<String>,
        L: Into<String>,
    {
        Self::string(label).with_options(options)
    }

    pub fn select_multiple<K, L>(
        label: impl Into<String>,
        options: impl IntoIterator<Item = (K, L)>,
    ) -> Self
    where
        K: Into<String>,
        L: Into<String>,
    {
        Self::string_array(label).with_options(options)
    }

    pub fn integer(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Integer, false)
    }

    pub fn integer_array(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Integer, true)
    }

    pub fn float(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Float, false)
    }

    pub fn boolean(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Boolean, false)
    }

    pub fn boolean_array(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Boolean, true)
    }

    /// Date, date-time and time fields share one storage form (RFC 3339 string or null).
    pub fn date(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Date, false)
    }

    pub fn date_time(label: impl Into<String>) -> Self {
        Self::date(label)
    }

    pub fn time(label: impl Into<String>) -> Self {
        Self::date(label)
    }

    /// Enum field; attaches an enum validator for the table.
    pub fn enumeration(label: impl Into<String>, table: EnumTable) -> Self {
        Self::with_type(label, FieldType::Enum(table.clone()), false)
            .with_validator(Validator::Enum(table))
    }

    pub fn object(label: impl Into<String>) -> Self {
        Self::with_type(label, FieldType::Object, false)
    }

    pub fn reference(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_type(
            label,
            FieldType::Reference {
                target: target.into(),
            },
            false,
        )
    }

    pub fn reference_array(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_type(
            label,
            FieldType::Reference {
                target: target.into(),
            },
            true,
        )
    }

    /// Array of nested records. Always array-valued; the nested schema's
    /// slot 0 holds each child's generated id.
    pub fn sub_records(label: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self::with_type(label, FieldType::SubRecordArray(schema), true)
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn required(self) -> Self {
        self.with_validator(Validator::Required)
    }

    pub fn with_options<K, L>(mut self, options: impl IntoIterator<Item = (K, L)>) -> Self
    where
        K: Into<String>,
        L: Into<String>,
    {
        self.options = options
            .into_iter()
            .map(|(value, label)| SelectOption {
                value: value.into(),
                label: label.into(),
            })
            .collect();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn type_tag(&self) -> FieldTypeTag {
        self.field_type.tag()
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn is_required(&self) -> bool {
        self.validators.iter().any(|v| matches!(v, Validator::Required))
    }

    /// Nested schema for sub-record array fields.
    pub fn sub_schema(&self) -> Option<&Arc<Schema>> {
        match &self.field_type {
            FieldType::SubRecordArray(schema) => Some(schema),
            _ => None,
        }
    }

    /// Default payload value for a fresh record.
    pub fn default_value(&self) -> Value {
        if self.is_array {
            return Value::Array(Vec::new());
        }
        match &self.field_type {
            FieldType::Boolean => Value::Bool(false),
            FieldType::Date | FieldType::Reference { .. } => Value::Null,
            FieldType::Enum(_) | FieldType::Integer => Value::from(0),
            FieldType::Float => Value::from(0.0),
            FieldType::String => Value::String(String::new()),
            FieldType::Object => Value::Object(Map::new()),
            // Constructed only through `sub_records`, which is always an array.
            FieldType::SubRecordArray(_) => Value::Array(Vec::new()),
        }
    }
}
