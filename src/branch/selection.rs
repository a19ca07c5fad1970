use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::patch::{MergeConflict, MergeDecision};
use crate::record::{EditSession, Record};

use super::branch::{Branch, MergeOutcome};

pub type ResolverError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// SelectionConflictResolver — user-provided conflict handling
// ============================================================================

/// Decides merge conflicts for records of a [`SelectionBranch`].
///
/// Receives the branch's current record next to its conflicts and must
/// return one decision per conflict, in order.
#[async_trait]
pub trait SelectionConflictResolver: Send + Sync {
    async fn resolve(
        &self,
        record: &Record,
        conflicts: Vec<MergeConflict>,
    ) -> std::result::Result<Vec<MergeDecision>, ResolverError>;
}

/// A fixed decision answers every conflict.
#[async_trait]
impl SelectionConflictResolver for MergeDecision {
    async fn resolve(
        &self,
        _record: &Record,
        conflicts: Vec<MergeConflict>,
    ) -> std::result::Result<Vec<MergeDecision>, ResolverError> {
        Ok(vec![*self; conflicts.len()])
    }
}

// ============================================================================
// SelectionBranch
// ============================================================================

type RefreshFn = dyn Fn(&[Record]) + Send + Sync;

/// One [`Branch`] per record of a result set, matched by record id.
///
/// `on_refresh` receives the current records whenever the selection changes.
pub struct SelectionBranch {
    branches: Vec<Branch>,
    on_refresh: Box<RefreshFn>,
}

impl SelectionBranch {
    pub fn new(on_refresh: impl Fn(&[Record]) + Send + Sync + 'static) -> Self {
        Self {
            branches: Vec::new(),
            on_refresh: Box::new(on_refresh),
        }
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.position(id).map(|i| &self.branches[i])
    }

    pub fn currents(&self) -> Vec<Record> {
        self.branches.iter().filter_map(|b| b.current().cloned()).collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.branches
            .iter()
            .position(|b| b.current().map(Record::id) == Some(id))
    }

    fn refresh(&self) {
        (self.on_refresh)(&self.currents());
    }

    /// Edit the record with `id`. Returns false when no branch holds it.
    pub fn edit<F>(&mut self, id: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut EditSession<'_>) -> Result<()>,
    {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        self.branches[index].edit(f)?;
        self.refresh();
        Ok(true)
    }

    /// Replace the selection with `incoming`.
    ///
    /// Records already in the selection are merged into their branch; new
    /// ones get a fresh branch; branches without an incoming record are
    /// dropped. The selection keeps the order of `incoming`. Returns whether
    /// any merge hit a conflict.
    pub async fn merge_with<R>(&mut self, incoming: Vec<Record>, resolver: &R) -> Result<bool>
    where
        R: SelectionConflictResolver + ?Sized,
    {
        let mut plan: Vec<(Option<usize>, Record)> = Vec::with_capacity(incoming.len());
        for record in incoming {
            if plan.iter().any(|(_, r)| r.id() == record.id()) {
                warn!(id = record.id(), "duplicate record id in selection, skipped");
                continue;
            }
            plan.push((self.position(record.id()), record));
        }

        // Nothing is committed until every merge has resolved.
        let mut pending = Vec::new();
        for (index, record) in &plan {
            let Some(index) = *index else { continue };
            let branch = &self.branches[index];
            let Some(current) = branch.current() else {
                continue;
            };
            let merge = branch
                .resolve_merge(record.clone(), |conflicts| resolver.resolve(current, conflicts))
                .await?;
            pending.push((index, merge));
        }

        let mut had_conflicts = false;
        for (index, merge) in pending {
            if let MergeOutcome::Merged { had_conflicts: true } = self.branches[index].commit_merge(merge) {
                had_conflicts = true;
            }
        }

        let mut previous: Vec<Option<Branch>> =
            std::mem::take(&mut self.branches).into_iter().map(Some).collect();
        self.branches = plan
            .into_iter()
            .map(|(index, record)| {
                index
                    .and_then(|i| previous[i].take())
                    .unwrap_or_else(|| Branch::new(record))
            })
            .collect();

        debug!(records = self.branches.len(), had_conflicts, "selection merged");
        self.refresh();
        Ok(had_conflicts)
    }
}
