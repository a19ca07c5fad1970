use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{PatchError, Result};
use crate::record::Record;
use crate::schema::{FieldType, Schema};

use super::apply::{apply_update, check_sub_record};
use super::path::{child_prefix, field_path};
use super::update::{ArrayDataType, ArrayEntry, ArrayOperation, PatchUpdate};
use super::MAX_PATCH_DEPTH;

// ============================================================================
// Patch
// ============================================================================

/// Structural difference between two payloads of one schema.
///
/// Sub-records are matched by id, primitive arrays are compared as sets and
/// every other field is compared by value.
#[derive(Debug, Clone)]
pub struct Patch {
    schema: Arc<Schema>,
    update: PatchUpdate,
}

impl Patch {
    /// Diff `old` against `new`. Both must share a schema.
    pub fn new(old: &Record, new: &Record) -> Result<Self> {
        Self::between(old.schema(), old.payload(), new.payload())
    }

    /// Diff two raw payloads of `schema`.
    pub fn between(schema: &Arc<Schema>, old: &[Value], new: &[Value]) -> Result<Self> {
        let mut differ = Differ::default();
        differ.diff_payload(schema, old, new, "", 0)?;
        Ok(Self {
            schema: Arc::clone(schema),
            update: differ.update,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn updates(&self) -> &PatchUpdate {
        &self.update
    }

    pub fn into_updates(self) -> PatchUpdate {
        self.update
    }

    pub fn is_empty(&self) -> bool {
        self.update.is_empty()
    }

    /// Apply this patch to `record`.
    pub fn apply_to(&self, record: &mut Record) -> Result<()> {
        apply_update(&self.update, record)
    }
}

// ============================================================================
// Diff walk
// ============================================================================

#[derive(Default)]
struct Differ {
    update: PatchUpdate,
}

impl Differ {
    fn set(&mut self, path: String, value: Value) -> Result<(), PatchError> {
        if self.update.set.contains_key(&path) {
            return Err(PatchError::DuplicatePath { op: "$set", path });
        }
        self.update.set.insert(path, value);
        Ok(())
    }

    fn array_op(
        target: &mut BTreeMap<String, ArrayOperation>,
        op: &'static str,
        path: String,
        data_type: ArrayDataType,
        entries: Vec<ArrayEntry>,
    ) -> Result<(), PatchError> {
        if entries.is_empty() {
            return Ok(());
        }
        if target.contains_key(&path) {
            return Err(PatchError::DuplicatePath { op, path });
        }
        target.insert(path, ArrayOperation::new(data_type, entries));
        Ok(())
    }

    fn diff_payload(
        &mut self,
        schema: &Schema,
        old: &[Value],
        new: &[Value],
        prefix: &str,
        depth: usize,
    ) -> Result<(), PatchError> {
        if depth > MAX_PATCH_DEPTH {
            return Err(PatchError::DepthExceeded(MAX_PATCH_DEPTH));
        }
        if old.len() != new.len() || old.len() != schema.len() {
            return Err(PatchError::LengthMismatch {
                path: if prefix.is_empty() { "root".into() } else { prefix.to_string() },
                old: old.len(),
                new: new.len(),
            });
        }

        for (index, entry) in schema.fields().iter().enumerate() {
            let path = field_path(prefix, index);
            let (old_value, new_value) = (&old[index], &new[index]);

            match entry.desc.field_type() {
                FieldType::SubRecordArray(sub) => {
                    self.diff_sub_records(sub, old_value, new_value, path, depth)?
                }
                _ if entry.desc.is_array() => self.diff_primitives(old_value, new_value, path)?,
                _ => {
                    if old_value != new_value {
                        self.set(path, new_value.clone())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn diff_sub_records(
        &mut self,
        schema: &Schema,
        old: &Value,
        new: &Value,
        path: String,
        depth: usize,
    ) -> Result<(), PatchError> {
        let old_children = children(old, &path)?;
        let new_children = children(new, &path)?;

        let new_by_id: BTreeMap<&str, &Vec<Value>> = new_children
            .iter()
            .map(|(_, id, payload)| (*id, *payload))
            .collect();

        let mut pulled = Vec::new();
        for (position, id, old_payload) in &old_children {
            match new_by_id.get(id) {
                Some(new_payload) => {
                    let prefix = child_prefix(&path, *position);
                    self.diff_payload(schema, old_payload, new_payload, &prefix, depth + 1)?;
                }
                None => pulled.push(ArrayEntry::new(*position, Value::String(id.to_string()))),
            }
        }

        let old_ids: Vec<&str> = old_children.iter().map(|(_, id, _)| *id).collect();
        let mut pushed = Vec::new();
        for (position, id, payload) in &new_children {
            if old_ids.contains(id) {
                continue;
            }
            let child = Value::Array((*payload).clone());
            check_sub_record(schema, &child, &child_prefix(&path, *position))?;
            pushed.push(ArrayEntry::new(*position, child));
        }

        Self::array_op(&mut self.update.push, "$push", path.clone(), ArrayDataType::SubRecord, pushed)?;
        Self::array_op(&mut self.update.pull, "$pull", path, ArrayDataType::SubRecord, pulled)
    }

    fn diff_primitives(&mut self, old: &Value, new: &Value, path: String) -> Result<(), PatchError> {
        let old_items = old
            .as_array()
            .ok_or_else(|| PatchError::NotAnArray { path: path.clone() })?;
        let new_items = new
            .as_array()
            .ok_or_else(|| PatchError::NotAnArray { path: path.clone() })?;

        let pushed = new_items
            .iter()
            .enumerate()
            .filter(|(_, v)| !old_items.contains(v))
            .map(|(position, v)| ArrayEntry::new(position, v.clone()))
            .collect();
        let pulled = old_items
            .iter()
            .enumerate()
            .filter(|(_, v)| !new_items.contains(v))
            .map(|(position, v)| ArrayEntry::new(position, v.clone()))
            .collect();

        Self::array_op(&mut self.update.push, "$push", path.clone(), ArrayDataType::Primitive, pushed)?;
        Self::array_op(&mut self.update.pull, "$pull", path, ArrayDataType::Primitive, pulled)
    }
}

/// `(position, id, payload)` for every child of a sub-record array value.
fn children<'v>(value: &'v Value, path: &str) -> Result<Vec<(usize, &'v str, &'v Vec<Value>)>, PatchError> {
    let items = value.as_array().ok_or_else(|| PatchError::NotAnArray {
        path: path.to_string(),
    })?;
    items
        .iter()
        .enumerate()
        .map(|(position, child)| {
            let payload = child.as_array();
            let id = payload.and_then(|p| p.first()).and_then(Value::as_str);
            match (payload, id) {
                (Some(payload), Some(id)) => Ok((position, id, payload)),
                _ => Err(PatchError::MalformedSubRecord {
                    path: child_prefix(path, position),
                }),
            }
        })
        .collect()
}
