//! Three-way merge of two patches computed against one common base.

use std::collections::BTreeMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::MergeError;

use super::diff::Patch;
use super::update::{ArrayDataType, ArrayEntry, ArrayOperation, PatchUpdate};

// ============================================================================
// Types
// ============================================================================

/// Answer to a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeDecision {
    Local,
    Remote,
    /// Use the conflict's precomputed [`MergeConflict::auto_decision`].
    #[default]
    Auto,
}

/// A concrete side of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSide {
    Local,
    Remote,
}

impl From<ConflictSide> for MergeDecision {
    fn from(side: ConflictSide) -> Self {
        match side {
            ConflictSide::Local => MergeDecision::Local,
            ConflictSide::Remote => MergeDecision::Remote,
        }
    }
}

/// The updates one side of a conflict would contribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub updates: PatchUpdate,
}

impl ConflictOption {
    fn new(description: impl Into<String>, updates: PatchUpdate) -> Self {
        Self {
            description: Some(description.into()),
            updates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub auto_decision: ConflictSide,
    pub local: ConflictOption,
    pub remote: ConflictOption,
}

impl MergeConflict {
    /// Updates chosen by `decision`.
    pub fn chosen(&self, decision: MergeDecision) -> &PatchUpdate {
        match self.side_for(decision) {
            ConflictSide::Local => &self.local.updates,
            ConflictSide::Remote => &self.remote.updates,
        }
    }

    pub fn side_for(&self, decision: MergeDecision) -> ConflictSide {
        match decision {
            MergeDecision::Local => ConflictSide::Local,
            MergeDecision::Remote => ConflictSide::Remote,
            MergeDecision::Auto => self.auto_decision,
        }
    }
}

// ============================================================================
// PatchMerge
// ============================================================================

/// Merge of a local patch (base to local) with a remote patch (base to remote).
///
/// Both inputs are copied on construction.
#[derive(Debug, Clone)]
pub struct PatchMerge {
    local: PatchUpdate,
    remote: PatchUpdate,
}

/// Conflicts found by [`PatchMerge::analyze`] plus the conflict-free remainder.
#[derive(Debug, Clone)]
pub struct MergePlan {
    conflicts: Vec<MergeConflict>,
    merged: PatchUpdate,
}

impl PatchMerge {
    pub fn new(local: &PatchUpdate, remote: &PatchUpdate) -> Self {
        Self {
            local: local.clone(),
            remote: remote.clone(),
        }
    }

    pub fn from_patches(local: &Patch, remote: &Patch) -> Self {
        Self::new(local.updates(), remote.updates())
    }

    /// Detect conflicts and merge everything else.
    pub fn analyze(self) -> MergePlan {
        let Self {
            mut local,
            mut remote,
        } = self;

        let mut conflicts = pull_conflicts(&mut remote, &mut local, ConflictSide::Remote);
        conflicts.extend(pull_conflicts(&mut local, &mut remote, ConflictSide::Local));
        conflicts.extend(set_conflicts(&mut local, &mut remote));

        let mut merged = PatchUpdate::new();
        merge_into(&mut merged, remote);
        merge_into(&mut merged, local);

        debug!(
            conflicts = conflicts.len(),
            merged_entries = merged.len(),
            "patch merge analyzed"
        );

        MergePlan { conflicts, merged }
    }

    /// Resolve every conflict with the same `decision`.
    pub fn run_and_resolve_with(self, decision: MergeDecision) -> Result<PatchUpdate, MergeError> {
        let plan = self.analyze();
        let decisions = vec![decision; plan.conflicts.len()];
        plan.resolve(&decisions)
    }

    /// Hand conflicts to `resolver` and apply its answers.
    ///
    /// The resolver is only called when there is at least one conflict and
    /// must return one decision per conflict, in the same order.
    pub async fn run_and_resolve_by<F, Fut, E>(self, resolver: F) -> Result<PatchUpdate, MergeError>
    where
        F: FnOnce(Vec<MergeConflict>) -> Fut,
        Fut: Future<Output = Result<Vec<MergeDecision>, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let plan = self.analyze();
        if plan.conflicts.is_empty() {
            return Ok(plan.merged);
        }
        let decisions = resolver(plan.conflicts.clone())
            .await
            .map_err(|e| MergeError::Resolver { source: e.into() })?;
        plan.resolve(&decisions)
    }
}

impl MergePlan {
    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// The conflict-free part of the merge.
    pub fn merged(&self) -> &PatchUpdate {
        &self.merged
    }

    /// Final update: chosen conflict fragments, then the conflict-free remainder.
    pub fn resolve(self, decisions: &[MergeDecision]) -> Result<PatchUpdate, MergeError> {
        if decisions.len() != self.conflicts.len() {
            return Err(MergeError::DecisionCount {
                expected: self.conflicts.len(),
                actual: decisions.len(),
            });
        }

        let mut result = PatchUpdate::new();
        for (conflict, decision) in self.conflicts.iter().zip(decisions) {
            let side = conflict.side_for(*decision);
            debug!(?side, ?decision, "conflict resolved");
            result.absorb(conflict.chosen(*decision).clone());
        }
        merge_into(&mut result, self.merged);
        Ok(result)
    }
}

// ============================================================================
// Conflict detection
// ============================================================================

/// Move every entry under `prefix` out of `source`.
fn steal_prefixed<V>(source: &mut BTreeMap<String, V>, prefix: &str) -> BTreeMap<String, V> {
    let keys: Vec<String> = source
        .keys()
        .filter(|key| key.starts_with(prefix))
        .cloned()
        .collect();
    keys.into_iter()
        .filter_map(|key| source.remove(&key).map(|v| (key, v)))
        .collect()
}

/// Sub-record pulls in `pulling` against edits nested under the pulled
/// children in `other`. Each pulled child with nested edits becomes one
/// conflict that defaults to the pulling side.
fn pull_conflicts(
    pulling: &mut PatchUpdate,
    other: &mut PatchUpdate,
    pulling_side: ConflictSide,
) -> Vec<MergeConflict> {
    let mut conflicts = Vec::new();
    let paths: Vec<String> = pulling
        .pull
        .iter()
        .filter(|(_, op)| op.data_type == ArrayDataType::SubRecord)
        .map(|(path, _)| path.clone())
        .collect();

    for path in paths {
        let Some(op) = pulling.pull.get_mut(&path) else {
            continue;
        };
        let mut kept = Vec::with_capacity(op.entries.len());
        for entry in op.entries.drain(..) {
            let prefix = format!("{}.{}.", path, entry.position);
            let edits = PatchUpdate {
                set: steal_prefixed(&mut other.set, &prefix),
                push: steal_prefixed(&mut other.push, &prefix),
                pull: steal_prefixed(&mut other.pull, &prefix),
            };
            if edits.is_empty() {
                kept.push(entry);
                continue;
            }
            conflicts.push(pull_conflict(&path, entry, edits, pulling_side));
        }
        op.entries = kept;
        if op.entries.is_empty() {
            pulling.pull.remove(&path);
        }
    }
    conflicts
}

fn pull_conflict(
    path: &str,
    entry: ArrayEntry,
    edits: PatchUpdate,
    pulling_side: ConflictSide,
) -> MergeConflict {
    let id = entry.id_or_value.as_str().unwrap_or_default().to_string();
    let mut pull = PatchUpdate::new();
    pull.pull.insert(
        path.to_string(),
        ArrayOperation::new(ArrayDataType::SubRecord, vec![entry]),
    );
    let removal = ConflictOption::new(format!("remove sub-record {id} at \"{path}\""), pull);
    let changes = ConflictOption::new(format!("keep edits inside sub-record {id}"), edits);

    match pulling_side {
        ConflictSide::Local => MergeConflict {
            auto_decision: ConflictSide::Local,
            local: removal,
            remote: changes,
        },
        ConflictSide::Remote => MergeConflict {
            auto_decision: ConflictSide::Remote,
            local: changes,
            remote: removal,
        },
    }
}

/// Sets of one path on both sides. Equal values collapse into the remote
/// copy; differing values become a conflict that defaults to local.
fn set_conflicts(local: &mut PatchUpdate, remote: &mut PatchUpdate) -> Vec<MergeConflict> {
    let shared: Vec<String> = local
        .set
        .keys()
        .filter(|key| remote.set.contains_key(*key))
        .cloned()
        .collect();

    let mut conflicts = Vec::new();
    for path in shared {
        if local.set.get(&path) == remote.set.get(&path) {
            local.set.remove(&path);
            continue;
        }
        let (Some(local_value), Some(remote_value)) = (local.set.remove(&path), remote.set.remove(&path))
        else {
            continue;
        };
        conflicts.push(MergeConflict {
            auto_decision: ConflictSide::Local,
            local: set_option(&path, local_value),
            remote: set_option(&path, remote_value),
        });
    }
    conflicts
}

fn set_option(path: &str, value: Value) -> ConflictOption {
    let description = format!("set \"{path}\" to {value}");
    let mut updates = PatchUpdate::new();
    updates.set.insert(path.to_string(), value);
    ConflictOption::new(description, updates)
}

// ============================================================================
// Conflict-free merge
// ============================================================================

/// Fold `side` into `target`: sets overwrite, array operations on one path
/// are unioned by id (sub-records) or value (primitives).
fn merge_into(target: &mut PatchUpdate, side: PatchUpdate) {
    target.set.extend(side.set);
    for (path, op) in side.push {
        union_operation(&mut target.push, path, op);
    }
    for (path, op) in side.pull {
        union_operation(&mut target.pull, path, op);
    }
}

fn union_operation(target: &mut BTreeMap<String, ArrayOperation>, path: String, op: ArrayOperation) {
    match target.get_mut(&path) {
        Some(existing) => existing.union_with(op),
        None => {
            target.insert(path, op);
        }
    }
}
