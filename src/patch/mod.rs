pub mod apply;
pub mod diff;
pub mod merge;
pub mod path;
pub mod update;

/// Maximum sub-record nesting walked by diff and path resolution.
pub const MAX_PATCH_DEPTH: usize = 100;

pub use apply::apply_update;
pub use diff::Patch;
pub use merge::{ConflictOption, ConflictSide, MergeConflict, MergeDecision, MergePlan, PatchMerge};
pub use path::{parse_path, resolve_path, ResolvedPath};
pub use update::{ArrayDataType, ArrayEntry, ArrayOperation, PatchUpdate};
