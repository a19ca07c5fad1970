//! Schema definition with a fluent builder.
//!
//! A schema is an ordered list of fields grouped into named segments. The
//! position of a field in that list is its payload index. Slot 0 is always
//! the `_id` string identifier, injected by `build()`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::error::SchemaError;

use super::field::{FieldDesc, FieldId};

// ============================================================================
// Constants
// ============================================================================

/// Segment that holds fields added without an explicit segment.
pub const ROOT_SEGMENT: &str = "root";

/// Key of the generated identifier field at index 0.
pub const ID_KEY: &str = "_id";

static NEXT_FIELD_ID: AtomicU32 = AtomicU32::new(1);

fn next_field_id() -> FieldId {
    FieldId(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
}

static KEY_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn key_regex() -> &'static regex::Regex {
    KEY_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("key regex is valid")
    })
}

// ============================================================================
// FieldEntry
// ============================================================================

/// A field together with its position metadata.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub segment: String,
    pub key: String,
    pub id: FieldId,
    pub desc: FieldDesc,
}

impl FieldEntry {
    /// Dotted wire path of this field inside a document: `segment.key`.
    pub fn wire_path(&self) -> String {
        format!("{}.{}", self.segment, self.key)
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Ordered, immutable field list for one record type.
pub struct Schema {
    ident: String,
    module_ident: String,
    label: String,
    fields: Vec<FieldEntry>,
    index_by_id: HashMap<FieldId, usize>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.fields.iter().map(FieldEntry::wire_path).collect();
        f.debug_struct("Schema")
            .field("ident", &self.ident)
            .field("label", &self.label)
            .field("fields", &keys)
            .finish()
    }
}

impl Schema {
    /// Start a schema for `module`.
    pub fn builder(module: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            module: module.into(),
            sub: None,
            label: String::new(),
            fields: Vec::new(),
        }
    }

    /// `module` or `module_sub` when a sub identifier was given.
    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn module_ident(&self) -> &str {
        &self.module_ident
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Option<&FieldEntry> {
        self.fields.get(index)
    }

    /// Like [`Schema::field`] but reports out-of-range as an error.
    pub fn field_at(&self, index: usize) -> Result<&FieldEntry, SchemaError> {
        self.fields.get(index).ok_or(SchemaError::UnknownFieldIndex {
            index,
            len: self.fields.len(),
        })
    }

    pub fn field_index_of(&self, id: FieldId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    pub fn entry(&self, id: FieldId) -> Option<&FieldEntry> {
        self.field_index_of(id).map(|i| &self.fields[i])
    }

    /// Look up a field id by segment and key.
    pub fn field_id(&self, segment: &str, key: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .find(|f| f.segment == segment && f.key == key)
            .map(|f| f.id)
    }

    /// Look up a field id by key in the root segment.
    pub fn field_id_by_key(&self, key: &str) -> Option<FieldId> {
        self.field_id(ROOT_SEGMENT, key)
    }

    /// Like [`Schema::field_id_by_key`] but reports a missing key as an error.
    pub fn require_field(&self, key: &str) -> Result<FieldId, SchemaError> {
        self.field_id_by_key(key)
            .ok_or_else(|| SchemaError::UnknownField(key.to_string()))
    }

    /// Index of a root-segment key.
    pub fn index_of_key(&self, key: &str) -> Option<usize> {
        self.field_id_by_key(key).and_then(|id| self.field_index_of(id))
    }

    /// Id of the identifier field (always index 0).
    pub fn id_field(&self) -> FieldId {
        self.fields[0].id
    }

    /// Fresh payload of per-field defaults. Slot 0 is left as an empty id.
    pub fn default_payload(&self) -> Vec<Value> {
        self.fields.iter().map(|f| f.desc.default_value()).collect()
    }

    pub fn check_payload_len(&self, payload: &[Value]) -> Result<(), SchemaError> {
        if payload.len() != self.fields.len() {
            return Err(SchemaError::PayloadLength {
                expected: self.fields.len(),
                actual: payload.len(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent schema builder. Fields keep insertion order.
pub struct SchemaBuilder {
    module: String,
    sub: Option<String>,
    label: String,
    fields: Vec<(String, String, FieldDesc)>,
}

impl SchemaBuilder {
    pub fn sub_ident(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a field to the root segment.
    pub fn field(self, key: impl Into<String>, desc: FieldDesc) -> Self {
        self.segment_field(ROOT_SEGMENT, key, desc)
    }

    /// Add a field to a named segment.
    pub fn segment_field(
        mut self,
        segment: impl Into<String>,
        key: impl Into<String>,
        desc: FieldDesc,
    ) -> Self {
        self.fields.push((segment.into(), key.into(), desc));
        self
    }

    /// Finish the schema.
    ///
    /// Panics on invalid segment/key names, duplicate keys within a segment,
    /// or a user field named `_id` in the root segment.
    pub fn build(self) -> Arc<Schema> {
        let ident = match &self.sub {
            Some(sub) if !sub.is_empty() => format!("{}_{}", self.module, sub),
            _ => self.module.clone(),
        };

        let mut fields = Vec::with_capacity(self.fields.len() + 1);
        fields.push(FieldEntry {
            segment: ROOT_SEGMENT.to_string(),
            key: ID_KEY.to_string(),
            id: next_field_id(),
            desc: FieldDesc::string("ID"),
        });

        for (segment, key, desc) in self.fields {
            assert!(
                key_regex().is_match(&segment),
                "Invalid segment name \"{segment}\" in schema \"{ident}\""
            );
            assert!(
                key_regex().is_match(&key),
                "Invalid field name \"{key}\" in schema \"{ident}\""
            );
            assert!(
                !(segment == ROOT_SEGMENT && key == ID_KEY),
                "Field \"{ID_KEY}\" is reserved in schema \"{ident}\""
            );
            assert!(
                !fields
                    .iter()
                    .any(|f: &FieldEntry| f.segment == segment && f.key == key),
                "Duplicate field \"{segment}.{key}\" in schema \"{ident}\""
            );
            fields.push(FieldEntry {
                segment,
                key,
                id: next_field_id(),
                desc,
            });
        }

        let index_by_id = fields.iter().enumerate().map(|(i, f)| (f.id, i)).collect();

        Arc::new(Schema {
            ident,
            module_ident: self.module,
            label: self.label,
            fields,
            index_by_id,
        })
    }
}
