use std::fmt;
use thiserror::Error;

use crate::schema::FieldId;

// ---------------------------------------------------------------------------
// ValidationError / ValidationErrors
// ---------------------------------------------------------------------------

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub expected: String,
    pub received: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Validation failed at "{}": expected {}, received {}"#,
            self.path, self.expected, self.received
        )
    }
}

impl std::error::Error for ValidationError {}

/// A collection of one or more `ValidationError`s.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed:")?;
        for e in &self.0 {
            write!(f, "\n  - {}: expected {}, received {}", e.path, e.expected, e.received)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field index {index} out of range (schema has {len} fields)")]
    UnknownFieldIndex { index: usize, len: usize },

    #[error("Payload length mismatch: schema expects {expected} fields, got {actual}")]
    PayloadLength { expected: usize, actual: usize },

    #[error("Invalid wire value for \"{field}\": expected {expected}, received {received}")]
    InvalidWireValue {
        field: String,
        expected: String,
        received: String,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

// ---------------------------------------------------------------------------
// RecordError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Field index {index} out of range (record has {len} fields)")]
    FieldIndex { index: usize, len: usize },

    #[error("Field {index} is not a sub-record array")]
    NotSubRecordArray { index: usize },

    #[error("Child position {position} out of range for field {index} (length {len})")]
    ChildPosition {
        index: usize,
        position: usize,
        len: usize,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

// ---------------------------------------------------------------------------
// PatchError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Objects must have same size at \"{path}\": old has {old} fields, new has {new}")]
    LengthMismatch { path: String, old: usize, new: usize },

    #[error("{op} already defined on \"{path}\"")]
    DuplicatePath { op: &'static str, path: String },

    #[error("Wrong field-type for sub-index at \"{path}\", expected sub-record array")]
    NotSubRecordArray { path: String },

    #[error("Invalid patch path: \"{0}\"")]
    InvalidPath(String),

    #[error("Position {position} out of range at \"{path}\" (length {len})")]
    PositionOutOfRange {
        path: String,
        position: usize,
        len: usize,
    },

    #[error("Expected an array value at \"{path}\"")]
    NotAnArray { path: String },

    #[error("Malformed sub-record at \"{path}\": expected an array with a string id in slot 0")]
    MalformedSubRecord { path: String },

    #[error("Sub-record at \"{path}\" has {actual} fields, schema has {expected}")]
    SubRecordLength {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Sub-record array \"{path}\" cannot be replaced with $set")]
    SetOnSubRecordArray { path: String },

    #[error("Maximum patch depth exceeded ({0})")]
    DepthExceeded(usize),
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Conflict resolver returned {actual} decisions for {expected} conflicts")]
    DecisionCount { expected: usize, actual: usize },

    #[error("Conflict resolver failed")]
    Resolver {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Branch has no record to merge against")]
    EmptyBranch,
}

// ---------------------------------------------------------------------------
// FilterError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Can't generate output for a filter that is not fulfillable")]
    Unfulfillable,

    #[error("Field {0:?} is not part of the schema")]
    UnknownField(FieldId),

    #[error("Field index {0} is not part of the schema")]
    UnknownFieldIndex(usize),

    #[error("Filters are built over different schemas")]
    SchemaMismatch,

    #[error("Compare type doesn't exist: {0}")]
    UnknownOperator(String),

    #[error("Invalid operand for {op}: {reason}")]
    InvalidOperand { op: &'static str, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// LessRecordError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LessRecordError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Convenience alias — the default error type is `LessRecordError`.
pub type Result<T, E = LessRecordError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
