//! Patch update wire types.
//!
//! Paths are dot-joined alternating `field-index.array-position` integers,
//! e.g. `"2.0.1"` is field 1 of the child at position 0 of field 2.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of element an array operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayDataType {
    #[serde(rename = "primitive")]
    Primitive,
    #[serde(rename = "sub-record")]
    SubRecord,
}

/// One pushed or pulled array element.
///
/// For sub-record pulls `id_or_value` is the child id; for sub-record pushes
/// it is the whole child payload; for primitives it is the element value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub position: usize,
    #[serde(rename = "idOrValue")]
    pub id_or_value: Value,
}

impl ArrayEntry {
    pub fn new(position: usize, id_or_value: Value) -> Self {
        Self {
            position,
            id_or_value,
        }
    }

    /// Identity used when matching entries: the id for sub-records
    /// (slot 0 of a pushed payload), the value itself for primitives.
    pub fn identity(&self, data_type: ArrayDataType) -> &Value {
        match data_type {
            ArrayDataType::Primitive => &self.id_or_value,
            ArrayDataType::SubRecord => match &self.id_or_value {
                Value::Array(payload) => payload.first().unwrap_or(&self.id_or_value),
                other => other,
            },
        }
    }
}

/// Entries pushed to or pulled from one array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayOperation {
    #[serde(rename = "dataType")]
    pub data_type: ArrayDataType,
    #[serde(rename = "idsAndPositions")]
    pub entries: Vec<ArrayEntry>,
}

impl ArrayOperation {
    pub fn new(data_type: ArrayDataType, entries: Vec<ArrayEntry>) -> Self {
        Self {
            data_type,
            entries,
        }
    }

    /// Append entries of `other`, skipping ones whose identity is already present.
    pub fn union_with(&mut self, other: ArrayOperation) {
        for entry in other.entries {
            let identity = entry.identity(self.data_type);
            if !self
                .entries
                .iter()
                .any(|e| e.identity(self.data_type) == identity)
            {
                self.entries.push(entry);
            }
        }
    }
}

/// The `$set` / `$push` / `$pull` maps produced by a diff or a merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchUpdate {
    #[serde(rename = "$set", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, Value>,
    #[serde(rename = "$push", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub push: BTreeMap<String, ArrayOperation>,
    #[serde(rename = "$pull", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pull: BTreeMap<String, ArrayOperation>,
}

impl PatchUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.push.is_empty() && self.pull.is_empty()
    }

    /// Total number of set paths plus array entries.
    pub fn len(&self) -> usize {
        self.set.len()
            + self.push.values().map(|op| op.entries.len()).sum::<usize>()
            + self.pull.values().map(|op| op.entries.len()).sum::<usize>()
    }

    /// Fold `other` into `self`: sets overwrite, push/pull lists under the
    /// same path are concatenated.
    pub fn absorb(&mut self, other: PatchUpdate) {
        self.set.extend(other.set);
        for (path, op) in other.push {
            append_operation(&mut self.push, path, op);
        }
        for (path, op) in other.pull {
            append_operation(&mut self.pull, path, op);
        }
    }
}

pub(crate) fn append_operation(
    target: &mut BTreeMap<String, ArrayOperation>,
    path: String,
    op: ArrayOperation,
) {
    match target.get_mut(&path) {
        Some(existing) => existing.entries.extend(op.entries),
        None => {
            target.insert(path, op);
        }
    }
}
