pub mod error;

pub mod branch;
pub mod filter;
pub mod patch;
pub mod record;
pub mod schema;

pub use branch::{Branch, MergeOutcome, SelectionBranch, SelectionConflictResolver};
pub use error::{LessRecordError, Result};
pub use filter::{CompareOp, Filter};
pub use patch::{apply_update, MergeDecision, Patch, PatchMerge, PatchUpdate};
pub use record::{EditSession, Record};
pub use schema::{FieldDesc, FieldId, Schema};
