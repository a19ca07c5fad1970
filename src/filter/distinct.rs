use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::compare::ConstraintValue;
use super::range::RangeConstraint;

/// Encoded on the wire as `0` (`In`) and `1` (`Nin`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DistinctMode {
    /// Value must be one of the set.
    In,
    /// Value must be none of the set.
    Nin,
}

impl From<DistinctMode> for u8 {
    fn from(mode: DistinctMode) -> Self {
        match mode {
            DistinctMode::In => 0,
            DistinctMode::Nin => 1,
        }
    }
}

impl TryFrom<u8> for DistinctMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DistinctMode::In),
            1 => Ok(DistinctMode::Nin),
            other => Err(format!("invalid distinct mode {other}, expected 0 or 1")),
        }
    }
}

impl DistinctMode {
    pub fn inverse(self) -> Self {
        match self {
            DistinctMode::In => DistinctMode::Nin,
            DistinctMode::Nin => DistinctMode::In,
        }
    }
}

/// Set membership constraint. The value list has set semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinctConstraint<T> {
    mode: DistinctMode,
    #[serde(rename = "filterValues")]
    values: Vec<T>,
}

impl<T> Default for DistinctConstraint<T> {
    fn default() -> Self {
        Self {
            mode: DistinctMode::Nin,
            values: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Set helpers (equality by value)
// ---------------------------------------------------------------------------

fn dedup<T: PartialEq + Clone>(values: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn union<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = dedup(a);
    for v in b {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn without<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    dedup(a).into_iter().filter(|v| !b.contains(v)).collect()
}

fn intersection<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    dedup(a).into_iter().filter(|v| b.contains(v)).collect()
}

impl<T: ConstraintValue> DistinctConstraint<T> {
    pub fn new(mode: DistinctMode, values: &[T]) -> Self {
        Self {
            mode,
            values: dedup(values),
        }
    }

    pub fn mode(&self) -> DistinctMode {
        self.mode
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn passes(&self, value: &T) -> bool {
        let member = self.values.contains(value);
        match self.mode {
            DistinctMode::In => member,
            DistinctMode::Nin => !member,
        }
    }

    pub fn is_fulfillable(&self) -> bool {
        match self.mode {
            DistinctMode::Nin => true,
            DistinctMode::In => !self.values.is_empty(),
        }
    }

    pub fn is_always_fulfilled(&self) -> bool {
        self.mode == DistinctMode::Nin && self.values.is_empty()
    }

    /// Conjunction with `mode(values)`:
    ///
    /// | self | new | result |
    /// |---|---|---|
    /// | NIN | NIN | NIN(self ∪ new) |
    /// | NIN | IN | IN(new − self) |
    /// | IN | NIN | IN(self − new) |
    /// | IN | IN | IN(self ∩ new) |
    pub fn and_distinct(&mut self, mode: DistinctMode, values: &[T]) {
        let (next_mode, next_values) = match (self.mode, mode) {
            (DistinctMode::Nin, DistinctMode::Nin) => (DistinctMode::Nin, union(&self.values, values)),
            (DistinctMode::Nin, DistinctMode::In) => (DistinctMode::In, without(values, &self.values)),
            (DistinctMode::In, DistinctMode::Nin) => (DistinctMode::In, without(&self.values, values)),
            (DistinctMode::In, DistinctMode::In) => (DistinctMode::In, intersection(&self.values, values)),
        };
        self.mode = next_mode;
        self.values = next_values;
    }

    /// Drop held values that fall outside `range`.
    pub fn and_range(&mut self, range: &RangeConstraint<T>) {
        self.values.retain(|v| range.passes(v));
    }

    /// Copies of `base` narrowed to what `self` excludes.
    ///
    /// `IN(s)` excludes exactly `NIN(s)`, one copy. `NIN(s)` excludes each
    /// member of `s`, one `IN({x})` copy per member.
    pub fn subtract_from(&self, base: &DistinctConstraint<T>) -> Vec<DistinctConstraint<T>> {
        if self.is_always_fulfilled() {
            return Vec::new();
        }
        match self.mode {
            DistinctMode::In => {
                let mut clone = base.clone();
                clone.and_distinct(DistinctMode::Nin, &self.values);
                vec![clone]
            }
            DistinctMode::Nin => self
                .values
                .iter()
                .map(|v| {
                    let mut clone = base.clone();
                    clone.and_distinct(DistinctMode::In, std::slice::from_ref(v));
                    clone
                })
                .collect(),
        }
    }

    /// `$eq`/`$in`/`$ne`/`$nin`; singleton sets collapse to `$eq`/`$ne`.
    pub fn to_query(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut query = Map::new();
        if self.is_always_fulfilled() {
            return Ok(query);
        }
        let (op, value) = match (self.mode, self.values.as_slice()) {
            (DistinctMode::In, [single]) => ("$eq", serde_json::to_value(single)?),
            (DistinctMode::In, values) => ("$in", serde_json::to_value(values)?),
            (DistinctMode::Nin, [single]) => ("$ne", serde_json::to_value(single)?),
            (DistinctMode::Nin, values) => ("$nin", serde_json::to_value(values)?),
        };
        query.insert(op.to_string(), value);
        Ok(query)
    }
}
