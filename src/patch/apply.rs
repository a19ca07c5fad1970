use std::sync::Arc;

use serde_json::Value;

use crate::error::{PatchError, Result};
use crate::record::Record;
use crate::schema::Schema;

use super::path::{child_prefix, field_path, slot_mut};
use super::update::{ArrayDataType, ArrayOperation, PatchUpdate};

/// Apply `update` to `record`.
///
/// Sets run first, then pushes (appended in entry order), then pulls. Pulls
/// run deepest path first so nested pulls address positions before their
/// parent array shrinks. On error the record is left untouched.
pub fn apply_update(update: &PatchUpdate, record: &mut Record) -> Result<()> {
    let schema = Arc::clone(record.schema());
    let mut payload = record.payload().to_vec();
    apply_to_payload(update, &schema, &mut payload)?;
    *record.payload_mut() = payload;
    Ok(())
}

pub(crate) fn apply_to_payload(
    update: &PatchUpdate,
    schema: &Schema,
    payload: &mut [Value],
) -> Result<(), PatchError> {
    for (path, value) in &update.set {
        let (entry, slot) = slot_mut(schema, payload, path)?;
        if entry.desc.sub_schema().is_some() {
            return Err(PatchError::SetOnSubRecordArray { path: path.clone() });
        }
        *slot = value.clone();
    }

    for (path, op) in &update.push {
        let (entry, slot) = slot_mut(schema, payload, path)?;
        let sub_schema = match (op.data_type, entry.desc.sub_schema()) {
            (ArrayDataType::SubRecord, Some(sub)) => Some(Arc::clone(sub)),
            (ArrayDataType::SubRecord, None) => {
                return Err(PatchError::NotSubRecordArray { path: path.clone() })
            }
            (ArrayDataType::Primitive, _) => None,
        };
        let items = array_mut(slot, path)?;
        for pushed in &op.entries {
            if let Some(sub) = &sub_schema {
                let child_path = child_prefix(path, pushed.position);
                check_sub_record(sub, &pushed.id_or_value, &child_path)?;
            }
            items.push(pushed.id_or_value.clone());
        }
    }

    for (path, op) in update.pull.iter().rev() {
        let (_, slot) = slot_mut(schema, payload, path)?;
        let items = array_mut(slot, path)?;
        items.retain(|item| !is_pulled(op, item));
    }

    Ok(())
}

fn array_mut<'v>(slot: &'v mut Value, path: &str) -> Result<&'v mut Vec<Value>, PatchError> {
    // An unset array field behaves as empty.
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut().ok_or_else(|| PatchError::NotAnArray {
        path: path.to_string(),
    })
}

/// Check a whole sub-record payload against `schema`: string id in slot 0,
/// one value per field, and the same for every nested sub-record.
pub(crate) fn check_sub_record(schema: &Schema, value: &Value, path: &str) -> Result<(), PatchError> {
    let fields = match value.as_array() {
        Some(fields) if fields.first().is_some_and(Value::is_string) => fields,
        _ => {
            return Err(PatchError::MalformedSubRecord {
                path: path.to_string(),
            })
        }
    };
    if fields.len() != schema.len() {
        return Err(PatchError::SubRecordLength {
            path: path.to_string(),
            expected: schema.len(),
            actual: fields.len(),
        });
    }

    for (index, entry) in schema.fields().iter().enumerate() {
        let Some(sub) = entry.desc.sub_schema() else {
            continue;
        };
        let nested_path = field_path(path, index);
        match &fields[index] {
            Value::Null => {}
            Value::Array(children) => {
                for (position, child) in children.iter().enumerate() {
                    check_sub_record(sub, child, &child_prefix(&nested_path, position))?;
                }
            }
            _ => return Err(PatchError::NotAnArray { path: nested_path }),
        }
    }
    Ok(())
}

fn is_pulled(op: &ArrayOperation, item: &Value) -> bool {
    let identity = match op.data_type {
        ArrayDataType::Primitive => item,
        ArrayDataType::SubRecord => match item.as_array().and_then(|p| p.first()) {
            Some(id) => id,
            None => return false,
        },
    };
    op.entries.iter().any(|e| &e.id_or_value == identity)
}
