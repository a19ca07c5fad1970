use std::future::Future;

use tracing::debug;

use crate::error::{MergeError, Result};
use crate::patch::{apply_update, MergeConflict, MergeDecision, Patch, PatchMerge, PatchUpdate};
use crate::record::{EditSession, Record};

use super::listeners::{ChangeListeners, ListenerId};

/// Result of [`Branch::merge_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The branch was empty and took the incoming record as-is.
    Adopted,
    Merged { had_conflicts: bool },
}

/// A working copy of a record plus the snapshot it started from.
///
/// Local edits go through [`Branch::edit`]; [`Branch::merge_with`] folds a
/// newer upstream version in and rebases the branch onto it.
pub struct Branch {
    initial: Option<Record>,
    current: Option<Record>,
    listeners: ChangeListeners<Record>,
}

impl Branch {
    pub fn new(record: Record) -> Self {
        Self {
            initial: Some(record.clone()),
            current: Some(record),
            listeners: ChangeListeners::new(),
        }
    }

    /// A branch with no record yet. The first merge adopts its input.
    pub fn empty() -> Self {
        Self {
            initial: None,
            current: None,
            listeners: ChangeListeners::new(),
        }
    }

    /// Patch produced by running `edit` against a copy of `record`.
    pub fn simple_patch<F>(record: &Record, edit: F) -> Result<PatchUpdate>
    where
        F: FnOnce(&mut EditSession<'_>) -> Result<()>,
    {
        let mut branch = Branch::new(record.clone());
        branch.edit(edit)?;
        Ok(branch.patch()?.into_updates())
    }

    pub fn current(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    pub fn initial(&self) -> Option<&Record> {
        self.initial.as_ref()
    }

    fn snapshots(&self) -> Result<(&Record, &Record), MergeError> {
        match (&self.initial, &self.current) {
            (Some(initial), Some(current)) => Ok((initial, current)),
            _ => Err(MergeError::EmptyBranch),
        }
    }

    fn set_current(&mut self, record: Record) {
        self.listeners.emit(&record);
        self.current = Some(record);
    }

    /// Run `f` in an edit session on the current record and keep the result
    /// if it changed anything.
    pub fn edit<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut EditSession<'_>) -> Result<()>,
    {
        let current = self.current.as_mut().ok_or(MergeError::EmptyBranch)?;
        let mut session = current.begin_edit();
        f(&mut session)?;
        if !session.has_changes() {
            return Ok(());
        }
        let next = session.commit();
        self.set_current(next);
        Ok(())
    }

    /// Local changes since the last merge.
    pub fn patch(&self) -> Result<Patch> {
        let (initial, current) = self.snapshots()?;
        Patch::new(initial, current)
    }

    /// Drop local changes.
    pub fn reset(&mut self) -> Result<()> {
        let (initial, current) = self.snapshots()?;
        let reverted = current.clone_with_data_from(initial);
        self.set_current(reverted);
        Ok(())
    }

    pub fn on_current_change(&self, callback: impl Fn(&Record) + Send + Sync + 'static) -> ListenerId {
        self.listeners.on(callback)
    }

    pub fn off(&self, id: ListenerId) {
        self.listeners.off(id)
    }

    // ------------------------------------------------------------------------
    // Merging
    // ------------------------------------------------------------------------

    /// Merge `next` (a newer upstream version) into the branch.
    ///
    /// Conflicts between local changes and upstream changes are passed to
    /// `resolver`. Afterwards `next` is the new initial snapshot and the
    /// current record is `next`'s metadata with both change sets applied.
    pub async fn merge_with<F, Fut, E>(&mut self, next: Record, resolver: F) -> Result<MergeOutcome>
    where
        F: FnOnce(Vec<MergeConflict>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<MergeDecision>, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let pending = self.resolve_merge(next, resolver).await?;
        Ok(self.commit_merge(pending))
    }

    /// [`Branch::merge_with`] answering every conflict with `decision`.
    pub fn merge_with_decision(&mut self, next: Record, decision: MergeDecision) -> Result<MergeOutcome> {
        if self.initial.is_none() {
            return Ok(self.commit_merge(PendingMerge::Adopt(next)));
        }
        let plan = self.prepare(&next)?.analyze();
        let had_conflicts = plan.has_conflicts();
        let decisions = vec![decision; plan.conflicts().len()];
        let update = plan.resolve(&decisions)?;
        let pending = self.rebased(next, &update, had_conflicts)?;
        Ok(self.commit_merge(pending))
    }

    /// Compute the result of merging `next` without touching the branch.
    pub(crate) async fn resolve_merge<F, Fut, E>(&self, next: Record, resolver: F) -> Result<PendingMerge>
    where
        F: FnOnce(Vec<MergeConflict>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<MergeDecision>, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if self.initial.is_none() {
            return Ok(PendingMerge::Adopt(next));
        }
        let merge = self.prepare(&next)?;
        let mut had_conflicts = false;
        let update = merge
            .run_and_resolve_by(|conflicts| {
                had_conflicts = true;
                resolver(conflicts)
            })
            .await?;
        self.rebased(next, &update, had_conflicts)
    }

    pub(crate) fn commit_merge(&mut self, pending: PendingMerge) -> MergeOutcome {
        match pending {
            PendingMerge::Adopt(next) => {
                debug!(id = next.id(), "branch adopted record");
                self.initial = Some(next.clone());
                self.set_current(next);
                MergeOutcome::Adopted
            }
            PendingMerge::Rebase {
                next,
                merged,
                had_conflicts,
            } => {
                debug!(id = merged.id(), had_conflicts, "branch merged");
                self.initial = Some(next);
                self.set_current(merged);
                MergeOutcome::Merged { had_conflicts }
            }
        }
    }

    fn prepare(&self, next: &Record) -> Result<PatchMerge> {
        let (initial, current) = self.snapshots()?;
        let local = Patch::new(initial, current)?;
        let remote = Patch::new(initial, next)?;
        Ok(PatchMerge::from_patches(&local, &remote))
    }

    /// Both patches are relative to the old initial snapshot, so the merged
    /// update is applied to its payload.
    fn rebased(&self, next: Record, update: &PatchUpdate, had_conflicts: bool) -> Result<PendingMerge> {
        let (initial, _) = self.snapshots()?;
        let mut merged = next.clone();
        *merged.payload_mut() = initial.payload().to_vec();
        apply_update(update, &mut merged)?;
        Ok(PendingMerge::Rebase {
            next,
            merged,
            had_conflicts,
        })
    }
}

/// A merge that has been resolved but not yet applied to its branch.
pub(crate) enum PendingMerge {
    Adopt(Record),
    Rebase {
        next: Record,
        merged: Record,
        had_conflicts: bool,
    },
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("initial", &self.initial)
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
