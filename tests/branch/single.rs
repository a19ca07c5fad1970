use std::future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use less_record::error::{LessRecordError, MergeError};
use less_record::patch::MergeConflict;
use less_record::{Branch, MergeDecision, MergeOutcome};
use serde_json::json;

use crate::common::*;

fn failing_resolver(
) -> impl FnOnce(Vec<MergeConflict>) -> future::Ready<Result<Vec<MergeDecision>, io::Error>> {
    |_| future::ready(Err(io::Error::other("resolver must not run")))
}

// ============================================================================
// Local edits
// ============================================================================

#[test]
fn edit_updates_current_and_keeps_initial() {
    let schema = order_schema();
    let mut branch = Branch::new(order(&schema, "A", vec![]));

    branch.edit(|s| s.set(NAME, json!("B"))).unwrap();
    assert_eq!(branch.current().unwrap().get(NAME).unwrap(), &json!("B"));
    assert_eq!(branch.initial().unwrap().get(NAME).unwrap(), &json!("A"));

    let patch = branch.patch().unwrap();
    assert_eq!(patch.updates().set["1"], json!("B"));
}

#[test]
fn reset_restores_initial_data() {
    let schema = order_schema();
    let mut branch = Branch::new(order(&schema, "A", vec![item("x", 1)]));
    branch.edit(|s| s.pull_child(ITEMS, 0).map(|_| ())).unwrap();
    assert!(!branch.patch().unwrap().is_empty());

    branch.reset().unwrap();
    assert!(branch.patch().unwrap().is_empty());
    assert_eq!(qty_of(branch.current().unwrap(), "x"), Some(1));
}

#[test]
fn listeners_fire_only_on_real_changes() {
    let schema = order_schema();
    let mut branch = Branch::new(order(&schema, "A", vec![]));
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = branch.on_current_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    branch.edit(|s| s.set(NAME, json!("A"))).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    branch.edit(|s| s.set(NAME, json!("B"))).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    branch.off(id);
    branch.edit(|s| s.set(NAME, json!("C"))).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_edit_keeps_current() {
    let schema = order_schema();
    let mut branch = Branch::new(order(&schema, "A", vec![]));
    let err = branch
        .edit(|s| {
            s.set(NAME, json!("B"))?;
            s.set(42, json!("boom"))
        })
        .unwrap_err();
    assert!(matches!(err, LessRecordError::Record(_)));
    assert_eq!(branch.current().unwrap().get(NAME).unwrap(), &json!("A"));
}

#[test]
fn empty_branch_rejects_edits() {
    let mut branch = Branch::empty();
    assert!(branch.current().is_none());
    assert!(matches!(
        branch.edit(|_| Ok(())).unwrap_err(),
        LessRecordError::Merge(MergeError::EmptyBranch)
    ));
    assert!(branch.patch().is_err());
}

#[test]
fn simple_patch_runs_an_edit_against_a_copy() {
    let schema = order_schema();
    let record = order(&schema, "A", vec![item("x", 1)]);
    let update = Branch::simple_patch(&record, |s| s.update_child(ITEMS, 0, |c| c.set(QTY, json!(8)))).unwrap();
    assert_eq!(update.set["2.0.1"], json!(8));
    assert_eq!(qty_of(&record, "x"), Some(1));
}

// ============================================================================
// Merging
// ============================================================================

#[tokio::test]
async fn empty_branch_adopts_the_first_record() {
    let schema = order_schema();
    let mut branch = Branch::empty();
    let outcome = branch
        .merge_with(order(&schema, "A", vec![]), failing_resolver())
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Adopted);
    assert_eq!(branch.initial(), branch.current());
}

#[tokio::test]
async fn upstream_changes_rebase_local_edits() {
    let schema = order_schema();
    let base = order(&schema, "A", vec![item("x", 1)]);
    let mut branch = Branch::new(base.clone());
    branch.edit(|s| s.set(NAME, json!("B"))).unwrap();

    let mut next = base.clone();
    next.update_child(ITEMS, 0, |c| c.set(QTY, json!(5))).unwrap();
    next.set_metadata("rev", json!(2));

    let outcome = branch.merge_with(next.clone(), failing_resolver()).await.unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { had_conflicts: false });

    let current = branch.current().unwrap();
    assert_eq!(current.get(NAME).unwrap(), &json!("B"));
    assert_eq!(qty_of(current, "x"), Some(5));
    assert_eq!(current.metadata("rev"), Some(&json!(2)));
    assert_eq!(branch.initial(), Some(&next));

    // Only the local edit is still pending.
    let pending = branch.patch().unwrap();
    assert_eq!(pending.updates().len(), 1);
    assert_eq!(pending.updates().set["1"], json!("B"));
}

#[tokio::test]
async fn conflicting_edits_go_through_the_resolver() {
    let schema = order_schema();
    let base = order(&schema, "A", vec![]);
    let mut branch = Branch::new(base.clone());
    branch.edit(|s| s.set(NAME, json!("local"))).unwrap();
    let mut next = base.clone();
    next.set(NAME, json!("remote")).unwrap();

    let outcome = branch
        .merge_with(next, |conflicts| async move {
            assert_eq!(conflicts.len(), 1);
            Ok::<_, io::Error>(vec![MergeDecision::Remote])
        })
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { had_conflicts: true });
    assert_eq!(branch.current().unwrap().get(NAME).unwrap(), &json!("remote"));
    assert!(branch.patch().unwrap().is_empty());
}

#[tokio::test]
async fn resolver_failure_leaves_branch_untouched() {
    let schema = order_schema();
    let base = order(&schema, "A", vec![]);
    let mut branch = Branch::new(base.clone());
    branch.edit(|s| s.set(NAME, json!("local"))).unwrap();
    let mut next = base.clone();
    next.set(NAME, json!("remote")).unwrap();

    let err = branch.merge_with(next, failing_resolver()).await.unwrap_err();
    assert!(matches!(err, LessRecordError::Merge(MergeError::Resolver { .. })));
    assert_eq!(branch.initial(), Some(&base));
    assert_eq!(branch.current().unwrap().get(NAME).unwrap(), &json!("local"));
}

#[test]
fn merge_with_decision_answers_every_conflict() {
    let schema = order_schema();
    let base = order(&schema, "A", vec![]);
    let mut branch = Branch::new(base.clone());
    branch
        .edit(|s| {
            s.set(NAME, json!("local"))?;
            s.set(AGE, json!(30))
        })
        .unwrap();
    let mut next = base.clone();
    next.set(NAME, json!("remote")).unwrap();
    next.set(AGE, json!(40)).unwrap();

    let outcome = branch.merge_with_decision(next, MergeDecision::Auto).unwrap();
    assert_eq!(outcome, MergeOutcome::Merged { had_conflicts: true });
    let current = branch.current().unwrap();
    assert_eq!(current.get(NAME).unwrap(), &json!("local"));
    assert_eq!(current.get(AGE).unwrap(), &json!(30));
}
