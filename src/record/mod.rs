//! Positional records: a schema plus one payload value per field.
//!
//! Sub-record array fields hold arrays of nested payloads; slot 0 of each
//! nested payload is the child's generated id.

pub mod id;
pub mod session;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RecordError, Result, SchemaError, ValidationErrors};
use crate::schema::{validate_payload, FieldId, Schema};

pub use id::{generate_id, ID_LENGTH};
pub use session::EditSession;

// ============================================================================
// Transfer Types
// ============================================================================

/// One entry of a record's version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordVersion {
    /// User that produced the version.
    #[serde(rename = "u")]
    pub user: String,
    #[serde(rename = "t")]
    pub time: DateTime<Utc>,
}

/// Serializable record form used to move records between processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTransfer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub versions: Vec<RecordVersion>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    pub payload: Vec<Value>,
}

// ============================================================================
// Record
// ============================================================================

#[derive(Clone)]
pub struct Record {
    schema: Arc<Schema>,
    versions: Vec<RecordVersion>,
    meta: Map<String, Value>,
    payload: Vec<Value>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("schema", &self.schema.ident())
            .field("versions", &self.versions)
            .field("meta", &self.meta)
            .field("payload", &self.payload)
            .finish()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema)
            && self.payload == other.payload
            && self.versions == other.versions
            && self.meta == other.meta
    }
}

impl Record {
    /// Fresh record of defaults with a generated id.
    pub fn new(schema: Arc<Schema>) -> Self {
        let mut payload = schema.default_payload();
        payload[0] = Value::String(generate_id());
        Self {
            schema,
            versions: Vec::new(),
            meta: Map::new(),
            payload,
        }
    }

    /// Wrap an existing payload. The id is read from slot 0.
    pub fn from_payload(schema: Arc<Schema>, payload: Vec<Value>) -> Result<Self> {
        schema.check_payload_len(&payload)?;
        Ok(Self {
            schema,
            versions: Vec::new(),
            meta: Map::new(),
            payload,
        })
    }

    /// Rebuild a record from its transfer form. Slot 0 is overwritten with the transfer id.
    pub fn from_transfer(transfer: RecordTransfer, schema: Arc<Schema>) -> Result<Self> {
        schema.check_payload_len(&transfer.payload)?;
        let mut payload = transfer.payload;
        payload[0] = Value::String(transfer.id);
        Ok(Self {
            schema,
            versions: transfer.versions,
            meta: transfer.meta,
            payload,
        })
    }

    /// Build a record from a `{segment: {key: value}}` wire document.
    pub fn from_document(schema: Arc<Schema>, document: &Value) -> Result<Self> {
        let mut payload = schema.document_to_payload(document)?;
        if payload[0].as_str().map(str::is_empty).unwrap_or(true) {
            payload[0] = Value::String(generate_id());
        }
        Self::from_payload(schema, payload)
    }

    pub fn to_transfer(&self) -> RecordTransfer {
        RecordTransfer {
            id: self.id().to_string(),
            versions: self.versions.clone(),
            meta: self.meta.clone(),
            payload: self.payload.clone(),
        }
    }

    pub fn to_document(&self) -> Result<Value> {
        Ok(self.schema.payload_to_document(&self.payload)?)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn id(&self) -> &str {
        self.payload.first().and_then(Value::as_str).unwrap_or("")
    }

    /// `id@schema-ident`, unique across record types.
    pub fn id_with_schema(&self) -> String {
        format!("{}@{}", self.id(), self.schema.ident())
    }

    pub fn versions(&self) -> &[RecordVersion] {
        &self.versions
    }

    pub fn push_version(&mut self, user: impl Into<String>, time: DateTime<Utc>) {
        self.versions.push(RecordVersion {
            user: user.into(),
            time,
        });
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.meta.insert(key.into(), value);
    }

    pub fn payload(&self) -> &[Value] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<Value> {
        self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut Vec<Value> {
        &mut self.payload
    }

    /// Copy of this record carrying the data (versions, meta, payload) of `other`.
    pub fn clone_with_data_from(&self, other: &Record) -> Record {
        Record {
            schema: Arc::clone(&self.schema),
            versions: other.versions.clone(),
            meta: other.meta.clone(),
            payload: other.payload.clone(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        validate_payload(&self.schema, &self.payload)
    }

    /// Start an edit session; see [`EditSession`].
    pub fn begin_edit(&mut self) -> EditSession<'_> {
        EditSession::new(self)
    }

    // ------------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------------

    pub fn get(&self, index: usize) -> Result<&Value> {
        self.payload.get(index).ok_or_else(|| {
            RecordError::FieldIndex {
                index,
                len: self.payload.len(),
            }
            .into()
        })
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let len = self.payload.len();
        let slot = self
            .payload
            .get_mut(index)
            .ok_or(RecordError::FieldIndex { index, len })?;
        *slot = value;
        Ok(())
    }

    fn index_of(&self, field: FieldId) -> Result<usize> {
        self.schema
            .field_index_of(field)
            .ok_or_else(|| SchemaError::UnknownField(format!("{field:?}")).into())
    }

    pub fn get_field(&self, field: FieldId) -> Result<&Value> {
        let index = self.index_of(field)?;
        self.get(index)
    }

    pub fn set_field(&mut self, field: FieldId, value: Value) -> Result<()> {
        let index = self.index_of(field)?;
        self.set(index, value)
    }

    // ------------------------------------------------------------------------
    // Sub-records
    // ------------------------------------------------------------------------

    fn sub_schema(&self, index: usize) -> Result<Arc<Schema>> {
        let entry = self.schema.field_at(index)?;
        entry
            .desc
            .sub_schema()
            .cloned()
            .ok_or_else(|| RecordError::NotSubRecordArray { index }.into())
    }

    fn children(&self, index: usize) -> Result<&Vec<Value>> {
        self.get(index)?.as_array().ok_or_else(|| {
            RecordError::MalformedPayload(format!("field {index} does not hold an array")).into()
        })
    }

    fn children_mut(&mut self, index: usize) -> Result<&mut Vec<Value>> {
        let len = self.payload.len();
        self.payload
            .get_mut(index)
            .ok_or(RecordError::FieldIndex { index, len })?
            .as_array_mut()
            .ok_or_else(|| {
                RecordError::MalformedPayload(format!("field {index} does not hold an array"))
                    .into()
            })
    }

    fn child_payload(value: &Value) -> Result<Vec<Value>> {
        value
            .as_array()
            .cloned()
            .ok_or_else(|| RecordError::MalformedPayload("sub-record is not an array".into()).into())
    }

    /// Child records of a sub-record array field, in array order.
    pub fn sub_records(&self, index: usize) -> Result<Vec<Record>> {
        let schema = self.sub_schema(index)?;
        self.children(index)?
            .iter()
            .map(|child| Record::from_payload(Arc::clone(&schema), Self::child_payload(child)?))
            .collect()
    }

    /// Position of the child with `id`, if present.
    pub fn child_position(&self, index: usize, id: &str) -> Result<Option<usize>> {
        self.sub_schema(index)?;
        Ok(self
            .children(index)?
            .iter()
            .position(|child| child.get(0).and_then(Value::as_str) == Some(id)))
    }

    /// Append a new child with a generated id; `init` may fill in its fields.
    pub fn push_child<F>(&mut self, index: usize, init: F) -> Result<String>
    where
        F: FnOnce(&mut Record) -> Result<()>,
    {
        let schema = self.sub_schema(index)?;
        let mut child = Record::new(schema);
        init(&mut child)?;
        let id = child.id().to_string();
        self.children_mut(index)?.push(Value::Array(child.into_payload()));
        Ok(id)
    }

    /// Remove and return the child at `position`.
    pub fn pull_child(&mut self, index: usize, position: usize) -> Result<Record> {
        let schema = self.sub_schema(index)?;
        let children = self.children_mut(index)?;
        if position >= children.len() {
            return Err(RecordError::ChildPosition {
                index,
                position,
                len: children.len(),
            }
            .into());
        }
        let removed = children.remove(position);
        Record::from_payload(schema, Self::child_payload(&removed)?)
    }

    /// Mutate the child at `position` in place.
    pub fn update_child<F>(&mut self, index: usize, position: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut Record) -> Result<()>,
    {
        let schema = self.sub_schema(index)?;
        let children = self.children_mut(index)?;
        let len = children.len();
        let slot = children.get_mut(position).ok_or(RecordError::ChildPosition {
            index,
            position,
            len,
        })?;
        let mut child = Record::from_payload(schema, Self::child_payload(slot)?)?;
        f(&mut child)?;
        *slot = Value::Array(child.into_payload());
        Ok(())
    }
}
