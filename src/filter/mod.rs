pub mod compare;
pub mod distinct;
pub mod field;
pub mod range;
pub mod record_filter;

pub use compare::{compare_values, ConstraintValue};
pub use distinct::{DistinctConstraint, DistinctMode};
pub use field::{CompareOp, FieldConstraint, Operand};
pub use range::{RangeBound, RangeConstraint};
pub use record_filter::Filter;
