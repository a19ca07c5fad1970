use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FilterError;

use super::compare::ConstraintValue;
use super::distinct::{DistinctConstraint, DistinctMode};
use super::range::RangeConstraint;

// ============================================================================
// Operators
// ============================================================================

/// Comparison operator accepted by [`FieldConstraint::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    Nin,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::In => "$in",
            CompareOp::Nin => "$nin",
            CompareOp::Lt => "$lt",
            CompareOp::Lte => "$lte",
            CompareOp::Gt => "$gt",
            CompareOp::Gte => "$gte",
        }
    }

    /// `$in` and `$nin` take a list of values.
    pub fn takes_list(self) -> bool {
        matches!(self, CompareOp::In | CompareOp::Nin)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "$eq" => Ok(CompareOp::Eq),
            "$ne" => Ok(CompareOp::Ne),
            "$in" => Ok(CompareOp::In),
            "$nin" => Ok(CompareOp::Nin),
            "$lt" => Ok(CompareOp::Lt),
            "$lte" => Ok(CompareOp::Lte),
            "$gt" => Ok(CompareOp::Gt),
            "$gte" => Ok(CompareOp::Gte),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<T> for Operand<T> {
    fn from(value: T) -> Self {
        Operand::One(value)
    }
}

// ============================================================================
// FieldConstraint
// ============================================================================

/// Conjunction of one distinct and one range constraint on a single field.
///
/// Kept simplified after every `add`: distinct values outside the range are
/// dropped, and an `IN` set makes the range redundant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: ConstraintValue", deserialize = "T: ConstraintValue"))]
pub struct FieldConstraint<T> {
    #[serde(default, skip_serializing_if = "DistinctConstraint::is_always_fulfilled")]
    distinct: DistinctConstraint<T>,
    #[serde(default, skip_serializing_if = "RangeConstraint::is_always_fulfilled")]
    range: RangeConstraint<T>,
}

impl<T> Default for FieldConstraint<T> {
    fn default() -> Self {
        Self {
            distinct: DistinctConstraint::default(),
            range: RangeConstraint::default(),
        }
    }
}

impl<T: ConstraintValue> FieldConstraint<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(&self) -> &DistinctConstraint<T> {
        &self.distinct
    }

    pub fn range(&self) -> &RangeConstraint<T> {
        &self.range
    }

    pub fn passes(&self, value: &T) -> bool {
        self.distinct.passes(value) && self.range.passes(value)
    }

    pub fn is_fulfillable(&self) -> bool {
        self.distinct.is_fulfillable() && self.range.is_fulfillable()
    }

    pub fn is_always_fulfilled(&self) -> bool {
        self.distinct.is_always_fulfilled() && self.range.is_always_fulfilled()
    }

    /// Conjoin `op operand`. Does nothing once unfulfillable.
    /// Returns whether the constraint is still fulfillable.
    pub fn add(&mut self, op: CompareOp, operand: Operand<T>) -> Result<bool, FilterError> {
        if !self.is_fulfillable() {
            return Ok(false);
        }
        match (op, operand) {
            (CompareOp::In, Operand::Many(values)) => {
                self.distinct.and_distinct(DistinctMode::In, &values)
            }
            (CompareOp::Nin, Operand::Many(values)) => {
                self.distinct.and_distinct(DistinctMode::Nin, &values)
            }
            (CompareOp::Eq, Operand::One(value)) => {
                self.distinct.and_distinct(DistinctMode::In, std::slice::from_ref(&value))
            }
            (CompareOp::Ne, Operand::One(value)) => {
                self.distinct.and_distinct(DistinctMode::Nin, std::slice::from_ref(&value))
            }
            (CompareOp::Lt, Operand::One(value)) => self.range.and_lt(value),
            (CompareOp::Lte, Operand::One(value)) => self.range.and_lte(value),
            (CompareOp::Gt, Operand::One(value)) => self.range.and_gt(value),
            (CompareOp::Gte, Operand::One(value)) => self.range.and_gte(value),
            (op, _) => {
                return Err(FilterError::InvalidOperand {
                    op: op.as_str(),
                    reason: if op.takes_list() {
                        "expected a list of values".into()
                    } else {
                        "expected a single value".into()
                    },
                })
            }
        }
        self.simplify();
        Ok(self.is_fulfillable())
    }

    /// Restrict distinct values to the range; drop the range under `IN`.
    pub fn simplify(&mut self) {
        self.distinct.and_range(&self.range);
        if self.distinct.mode() == DistinctMode::In {
            self.range = RangeConstraint::default();
        }
    }

    /// Copies of `base`, each narrowed to one way of violating `self`.
    /// Their union is `base AND NOT self`.
    pub fn subtract_from(&self, base: &FieldConstraint<T>) -> Vec<FieldConstraint<T>> {
        let from_distinct = self.distinct.subtract_from(&base.distinct).into_iter().map(|distinct| {
            FieldConstraint {
                distinct,
                range: base.range.clone(),
            }
        });
        let from_range = self.range.subtract_from(&base.range).into_iter().map(|range| {
            FieldConstraint {
                distinct: base.distinct.clone(),
                range,
            }
        });
        from_distinct
            .chain(from_range)
            .map(|mut constraint| {
                constraint.simplify();
                constraint
            })
            .collect()
    }

    /// Mongo-style operator object for this field.
    pub fn to_query(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut query = self.distinct.to_query()?;
        query.extend(self.range.to_query()?);
        Ok(query)
    }
}
