use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::compare::ConstraintValue;

/// One side of a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBound<T> {
    #[serde(rename = "val")]
    pub value: T,
    #[serde(rename = "eq")]
    pub inclusive: bool,
}

impl<T> RangeBound<T> {
    pub fn exclusive(value: T) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }

    pub fn inclusive(value: T) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }
}

/// Optional upper (`lt`) and lower (`gt`) bound on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RangeConstraint<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lt: Option<RangeBound<T>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gt: Option<RangeBound<T>>,
}

impl<T> Default for RangeConstraint<T> {
    fn default() -> Self {
        Self { lt: None, gt: None }
    }
}

impl<T: ConstraintValue> RangeConstraint<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upper(&self) -> Option<&RangeBound<T>> {
        self.lt.as_ref()
    }

    pub fn lower(&self) -> Option<&RangeBound<T>> {
        self.gt.as_ref()
    }

    pub fn passes(&self, value: &T) -> bool {
        if self.is_always_fulfilled() {
            return true;
        }
        if !value.is_comparable() {
            return false;
        }
        if let Some(upper) = &self.lt {
            match value.compare(&upper.value) {
                Ordering::Less => {}
                Ordering::Equal if upper.inclusive => {}
                _ => return false,
            }
        }
        if let Some(lower) = &self.gt {
            match value.compare(&lower.value) {
                Ordering::Greater => {}
                Ordering::Equal if lower.inclusive => {}
                _ => return false,
            }
        }
        true
    }

    /// False when the interval between the bounds is empty.
    pub fn is_fulfillable(&self) -> bool {
        match (&self.gt, &self.lt) {
            (Some(lower), Some(upper)) => {
                let ord = lower.value.compare(&upper.value);
                if lower.inclusive && upper.inclusive {
                    ord != Ordering::Greater
                } else {
                    ord == Ordering::Less
                }
            }
            _ => true,
        }
    }

    pub fn is_always_fulfilled(&self) -> bool {
        self.lt.is_none() && self.gt.is_none()
    }

    pub fn and_lt(&mut self, value: T) {
        let replace = match &self.lt {
            None => true,
            Some(cur) => value.compare(&cur.value) != Ordering::Greater,
        };
        if replace {
            self.lt = Some(RangeBound::exclusive(value));
        }
    }

    pub fn and_lte(&mut self, value: T) {
        let replace = match &self.lt {
            None => true,
            Some(cur) => value.compare(&cur.value) == Ordering::Less,
        };
        if replace {
            self.lt = Some(RangeBound::inclusive(value));
        }
    }

    pub fn and_gt(&mut self, value: T) {
        let replace = match &self.gt {
            None => true,
            Some(cur) => value.compare(&cur.value) != Ordering::Less,
        };
        if replace {
            self.gt = Some(RangeBound::exclusive(value));
        }
    }

    pub fn and_gte(&mut self, value: T) {
        let replace = match &self.gt {
            None => true,
            Some(cur) => value.compare(&cur.value) == Ordering::Greater,
        };
        if replace {
            self.gt = Some(RangeBound::inclusive(value));
        }
    }

    /// Copies of `base`, one per bound of `self`, each narrowed to the values
    /// that bound excludes: `< x` gives `>= x`, `<= x` gives `> x` and so on.
    pub fn subtract_from(&self, base: &RangeConstraint<T>) -> Vec<RangeConstraint<T>> {
        let mut out = Vec::with_capacity(2);
        if let Some(upper) = &self.lt {
            let mut clone = base.clone();
            if upper.inclusive {
                clone.and_gt(upper.value.clone());
            } else {
                clone.and_gte(upper.value.clone());
            }
            out.push(clone);
        }
        if let Some(lower) = &self.gt {
            let mut clone = base.clone();
            if lower.inclusive {
                clone.and_lt(lower.value.clone());
            } else {
                clone.and_lte(lower.value.clone());
            }
            out.push(clone);
        }
        out
    }

    /// `$lt`/`$lte`/`$gt`/`$gte` operators.
    pub fn to_query(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut query = Map::new();
        if let Some(upper) = &self.lt {
            let op = if upper.inclusive { "$lte" } else { "$lt" };
            query.insert(op.to_string(), serde_json::to_value(&upper.value)?);
        }
        if let Some(lower) = &self.gt {
            let op = if lower.inclusive { "$gte" } else { "$gt" };
            query.insert(op.to_string(), serde_json::to_value(&lower.value)?);
        }
        Ok(query)
    }
}
