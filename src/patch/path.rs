//! Dotted patch paths.
//!
//! A path alternates field indices and array positions and always ends on a
//! field index: `"1"`, `"2.0.1"`, `"2.0.3.1.1"`. Every intermediate field must
//! be a sub-record array.

use serde_json::Value;

use crate::error::PatchError;
use crate::schema::{FieldEntry, FieldId, Schema};

use super::MAX_PATCH_DEPTH;

// ============================================================================
// Parsing
// ============================================================================

/// Split a dotted path into its integer segments.
pub fn parse_path(path: &str) -> Result<Vec<usize>, PatchError> {
    let segments = path
        .split('.')
        .map(|s| s.parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| PatchError::InvalidPath(path.to_string()))?;
    if segments.len() % 2 == 0 {
        return Err(PatchError::InvalidPath(path.to_string()));
    }
    if segments.len() / 2 > MAX_PATCH_DEPTH {
        return Err(PatchError::DepthExceeded(MAX_PATCH_DEPTH));
    }
    Ok(segments)
}

/// Path of field `index` below `prefix` (the empty prefix is the root record).
pub fn field_path(prefix: &str, index: usize) -> String {
    if prefix.is_empty() {
        index.to_string()
    } else {
        format!("{prefix}.{index}")
    }
}

/// Prefix addressing the child at `position` of the array at `path`.
pub fn child_prefix(path: &str, position: usize) -> String {
    format!("{path}.{position}")
}

// ============================================================================
// Schema resolution
// ============================================================================

/// A path resolved against a schema.
#[derive(Debug, Clone)]
pub struct ResolvedPath<'a> {
    /// The addressed (last) field.
    pub entry: &'a FieldEntry,
    /// Field ids along the path, outermost first.
    pub field_ids: Vec<FieldId>,
    /// `segment.key.position.segment.key` path into the wire document.
    pub wire_path: String,
}

fn field_in<'a>(schema: &'a Schema, index: usize, path: &str) -> Result<&'a FieldEntry, PatchError> {
    schema
        .field(index)
        .ok_or_else(|| PatchError::InvalidPath(path.to_string()))
}

/// Resolve a dotted path to the field it addresses.
pub fn resolve_path<'a>(schema: &'a Schema, path: &str) -> Result<ResolvedPath<'a>, PatchError> {
    let segments = parse_path(path)?;
    let mut current = schema;
    let mut field_ids = Vec::with_capacity(segments.len() / 2 + 1);
    let mut wire = Vec::with_capacity(segments.len() + 1);

    let (last, pairs) = segments
        .split_last()
        .ok_or_else(|| PatchError::InvalidPath(path.to_string()))?;

    for pair in pairs.chunks(2) {
        let entry = field_in(current, pair[0], path)?;
        let sub = entry
            .desc
            .sub_schema()
            .ok_or_else(|| PatchError::NotSubRecordArray {
                path: path.to_string(),
            })?;
        field_ids.push(entry.id);
        wire.push(entry.wire_path());
        wire.push(pair[1].to_string());
        current = sub.as_ref();
    }

    let entry = field_in(current, *last, path)?;
    field_ids.push(entry.id);
    wire.push(entry.wire_path());

    Ok(ResolvedPath {
        entry,
        field_ids,
        wire_path: wire.join("."),
    })
}

// ============================================================================
// Payload resolution
// ============================================================================

/// Mutable slot of the field addressed by `path` inside `payload`, together
/// with the schema that owns that field.
pub(crate) fn slot_mut<'s, 'p>(
    schema: &'s Schema,
    payload: &'p mut [Value],
    path: &str,
) -> Result<(&'s FieldEntry, &'p mut Value), PatchError> {
    let segments = parse_path(path)?;
    let (last, pairs) = segments
        .split_last()
        .ok_or_else(|| PatchError::InvalidPath(path.to_string()))?;

    let mut current_schema = schema;
    let mut current = payload;

    for pair in pairs.chunks(2) {
        let (field, position) = (pair[0], pair[1]);
        let entry = field_in(current_schema, field, path)?;
        let sub = entry
            .desc
            .sub_schema()
            .ok_or_else(|| PatchError::NotSubRecordArray {
                path: path.to_string(),
            })?;

        let node = current;
        let children = node
            .get_mut(field)
            .and_then(Value::as_array_mut)
            .ok_or_else(|| PatchError::NotAnArray {
                path: path.to_string(),
            })?;
        let len = children.len();
        let child = children
            .get_mut(position)
            .ok_or_else(|| PatchError::PositionOutOfRange {
                path: path.to_string(),
                position,
                len,
            })?;
        current = child
            .as_array_mut()
            .map(Vec::as_mut_slice)
            .ok_or_else(|| PatchError::MalformedSubRecord {
                path: path.to_string(),
            })?;
        current_schema = sub.as_ref();
    }

    let entry = field_in(current_schema, *last, path)?;
    let slot = current
        .get_mut(*last)
        .ok_or_else(|| PatchError::InvalidPath(path.to_string()))?;
    Ok((entry, slot))
}
