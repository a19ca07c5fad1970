use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{FilterError, Result};
use crate::record::Record;
use crate::schema::{FieldId, Schema};

use super::field::{CompareOp, FieldConstraint, Operand};

/// Conjunction of per-field constraints over records of one schema.
///
/// Once any field becomes unfulfillable the whole filter is, and further
/// `add` calls are ignored.
#[derive(Debug, Clone)]
pub struct Filter {
    schema: Arc<Schema>,
    fields: BTreeMap<FieldId, FieldConstraint<Value>>,
    fulfillable: bool,
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema)
            && self.fulfillable == other.fulfillable
            && self.fields == other.fields
    }
}

impl Filter {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            fields: BTreeMap::new(),
            fulfillable: true,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn fields(&self) -> &BTreeMap<FieldId, FieldConstraint<Value>> {
        &self.fields
    }

    pub fn field(&self, field: FieldId) -> Option<&FieldConstraint<Value>> {
        self.fields.get(&field)
    }

    pub fn is_fulfillable(&self) -> bool {
        self.fulfillable
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    /// Conjoin `field op value`. `$in`/`$nin` take a JSON array.
    pub fn add(&mut self, field: FieldId, op: CompareOp, value: Value) -> Result<(), FilterError> {
        if self.schema.field_index_of(field).is_none() {
            return Err(FilterError::UnknownField(field));
        }
        if !self.fulfillable {
            trace!(field = field.get(), %op, "filter is unfulfillable, add ignored");
            return Ok(());
        }

        let operand = match (op.takes_list(), value) {
            (true, Value::Array(values)) => Operand::Many(values),
            (true, other) => {
                return Err(FilterError::InvalidOperand {
                    op: op.as_str(),
                    reason: format!("expected an array, got {other}"),
                })
            }
            (false, value) => Operand::One(value),
        };

        let constraint = self.fields.entry(field).or_default();
        if !constraint.add(op, operand)? {
            self.fulfillable = false;
        }
        Ok(())
    }

    /// Like [`Filter::add`], addressing a root-segment field by key and
    /// taking the operator in its `$op` form.
    pub fn add_by_key(&mut self, key: &str, op: &str, value: Value) -> Result<()> {
        let field = self.schema.require_field(key)?;
        let op: CompareOp = op.parse()?;
        self.add(field, op, value)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Does `record` satisfy every field constraint?
    pub fn passes(&self, record: &Record) -> bool {
        self.fulfillable
            && self.fields.iter().all(|(field, constraint)| {
                record
                    .get_field(*field)
                    .map(|value| constraint.passes(value))
                    .unwrap_or(false)
            })
    }

    // ------------------------------------------------------------------------
    // Wire forms
    // ------------------------------------------------------------------------

    /// `{ "<fieldIndex>": { distinct?, range? } }`
    pub fn to_json(&self) -> Result<Value, FilterError> {
        if !self.fulfillable {
            return Err(FilterError::Unfulfillable);
        }
        let mut json = Map::new();
        for (field, constraint) in &self.fields {
            let index = self
                .schema
                .field_index_of(*field)
                .ok_or(FilterError::UnknownField(*field))?;
            json.insert(index.to_string(), serde_json::to_value(constraint)?);
        }
        Ok(Value::Object(json))
    }

    pub fn from_json(json: &Value, schema: Arc<Schema>) -> Result<Self, FilterError> {
        let by_index: BTreeMap<usize, FieldConstraint<Value>> = serde_json::from_value(json.clone())?;
        let mut fields = BTreeMap::new();
        for (index, constraint) in by_index {
            let entry = schema
                .field(index)
                .ok_or(FilterError::UnknownFieldIndex(index))?;
            fields.insert(entry.id, constraint);
        }
        let fulfillable = fields.values().all(FieldConstraint::is_fulfillable);
        Ok(Self {
            schema,
            fields,
            fulfillable,
        })
    }

    /// Mongo-style query keyed by `segment.key`.
    pub fn to_query(&self) -> Result<Map<String, Value>, FilterError> {
        if !self.fulfillable {
            return Err(FilterError::Unfulfillable);
        }
        let mut query = Map::new();
        for (field, constraint) in &self.fields {
            let entry = self
                .schema
                .entry(*field)
                .ok_or(FilterError::UnknownField(*field))?;
            query.insert(entry.wire_path(), Value::Object(constraint.to_query()?));
        }
        Ok(query)
    }

    // ------------------------------------------------------------------------
    // Subtraction
    // ------------------------------------------------------------------------

    /// `self AND NOT other` as a disjunction of filters.
    ///
    /// Each result narrows one field of `self` to one way that `other`'s
    /// constraint on that field can fail. Unfulfillable results are dropped.
    /// Both filters must share the same schema instance.
    pub fn and_not_ensured_by(&self, other: &Filter) -> Result<Vec<Filter>, FilterError> {
        self.check_same_schema(other)?;
        if !self.fulfillable {
            return Ok(Vec::new());
        }
        if !other.fulfillable {
            return Ok(vec![self.clone()]);
        }

        let mut unensured = Vec::new();
        for (field, other_constraint) in &other.fields {
            let base = self.fields.get(field).cloned().unwrap_or_default();
            for narrowed in other_constraint.subtract_from(&base) {
                if !narrowed.is_fulfillable() {
                    continue;
                }
                let mut candidate = self.clone();
                candidate.fields.insert(*field, narrowed);
                unensured.push(candidate);
            }
        }
        Ok(unensured)
    }

    /// `self AND NOT others[0] AND NOT others[1] ...` in disjunctive form.
    pub fn and_not_ensured_by_multiple(&self, others: &[Filter]) -> Result<Vec<Filter>, FilterError> {
        for other in others {
            self.check_same_schema(other)?;
        }
        let mut current = vec![self.clone()];
        for other in others {
            let mut next = Vec::new();
            for filter in &current {
                next.extend(filter.and_not_ensured_by(other)?);
            }
            current = next;
        }
        Ok(current)
    }

    fn check_same_schema(&self, other: &Filter) -> Result<(), FilterError> {
        if Arc::ptr_eq(&self.schema, &other.schema) {
            Ok(())
        } else {
            Err(FilterError::SchemaMismatch)
        }
    }
}
