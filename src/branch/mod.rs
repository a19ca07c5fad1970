#[allow(clippy::module_inception)]
pub mod branch;
pub mod listeners;
pub mod selection;

pub use branch::{Branch, MergeOutcome};
pub use listeners::{ChangeListeners, ListenerId};
pub use selection::{ResolverError, SelectionBranch, SelectionConflictResolver};
