use std::cmp::Ordering;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Value Comparison
// ============================================================================

/// Total order over JSON values used by range constraints.
///
/// - Null sorts after everything else
/// - Both numbers → f64 comparison (NaN treated as Equal)
/// - Both strings → lexicographic (codepoint order)
/// - Both booleans → false < true
/// - Cross-type → type rank: number(0), string(1), bool(2), other(3)
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(f64::NAN);
            let fb = nb.as_f64().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        _ => 3,
    }
}

// ============================================================================
// ConstraintValue
// ============================================================================

/// A value a field constraint can hold.
///
/// Membership uses `PartialEq`; ranges use [`ConstraintValue::compare`].
pub trait ConstraintValue: Clone + PartialEq + Debug + Serialize + DeserializeOwned {
    fn compare(&self, other: &Self) -> Ordering;

    /// Values that can never satisfy a bounded range (null, NaN).
    fn is_comparable(&self) -> bool {
        true
    }
}

impl ConstraintValue for Value {
    fn compare(&self, other: &Self) -> Ordering {
        compare_values(self, other)
    }

    fn is_comparable(&self) -> bool {
        !self.is_null()
    }
}

impl ConstraintValue for i64 {
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl ConstraintValue for f64 {
    fn compare(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }

    fn is_comparable(&self) -> bool {
        !self.is_nan()
    }
}

impl ConstraintValue for String {
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}
