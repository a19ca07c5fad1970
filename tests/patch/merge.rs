use std::io;

use less_record::error::MergeError;
use less_record::patch::{
    ArrayDataType, ArrayEntry, ArrayOperation, ConflictSide, MergeDecision, Patch, PatchMerge, PatchUpdate,
};
use serde_json::json;

use crate::common::*;

// ============================================================================
// Helpers
// ============================================================================

fn set(path: &str, value: serde_json::Value) -> PatchUpdate {
    let mut update = PatchUpdate::new();
    update.set.insert(path.into(), value);
    update
}

fn pull_items(entries: &[(usize, &str)]) -> PatchUpdate {
    let mut update = PatchUpdate::new();
    update.pull.insert(
        "2".into(),
        ArrayOperation::new(
            ArrayDataType::SubRecord,
            entries.iter().map(|(p, id)| ArrayEntry::new(*p, json!(id))).collect(),
        ),
    );
    update
}

fn tags_op(values: &[&str]) -> ArrayOperation {
    ArrayOperation::new(
        ArrayDataType::Primitive,
        values.iter().enumerate().map(|(p, v)| ArrayEntry::new(p, json!(v))).collect(),
    )
}

// ============================================================================
// Conflict detection
// ============================================================================

#[test]
fn disjoint_sets_merge_without_conflicts() {
    let plan = PatchMerge::new(&set("1", json!("B")), &set("2.0.1", json!(5))).analyze();
    assert!(!plan.has_conflicts());
    assert_eq!(plan.merged().set["1"], json!("B"));
    assert_eq!(plan.merged().set["2.0.1"], json!(5));
}

#[test]
fn equal_sets_collapse_silently() {
    let plan = PatchMerge::new(&set("1", json!("B")), &set("1", json!("B"))).analyze();
    assert!(!plan.has_conflicts());
    assert_eq!(plan.merged().set.len(), 1);
}

#[test]
fn different_sets_conflict_defaulting_to_local() {
    let plan = PatchMerge::new(&set("1", json!("L")), &set("1", json!("R"))).analyze();
    assert_eq!(plan.conflicts().len(), 1);
    let conflict = &plan.conflicts()[0];
    assert_eq!(conflict.auto_decision, ConflictSide::Local);
    assert_eq!(conflict.local.updates.set["1"], json!("L"));
    assert_eq!(conflict.remote.updates.set["1"], json!("R"));
    assert!(plan.merged().set.is_empty());

    let auto = PatchMerge::new(&set("1", json!("L")), &set("1", json!("R")))
        .run_and_resolve_with(MergeDecision::Auto)
        .unwrap();
    assert_eq!(auto.set["1"], json!("L"));
    let remote = PatchMerge::new(&set("1", json!("L")), &set("1", json!("R")))
        .run_and_resolve_with(MergeDecision::Remote)
        .unwrap();
    assert_eq!(remote.set["1"], json!("R"));
}

#[test]
fn remote_pull_against_local_nested_edit_defaults_to_remote() {
    let mut local = set("2.0.1", json!(4));
    local.set.insert("1".into(), json!("B"));
    let remote = pull_items(&[(0, "x")]);

    let plan = PatchMerge::new(&local, &remote).analyze();
    assert_eq!(plan.conflicts().len(), 1);
    let conflict = &plan.conflicts()[0];
    assert_eq!(conflict.auto_decision, ConflictSide::Remote);
    assert_eq!(conflict.local.updates.set.len(), 1);
    assert!(conflict.local.updates.set.contains_key("2.0.1"));
    assert_eq!(conflict.remote.updates.pull["2"].entries.len(), 1);

    // The unrelated local set is unaffected.
    assert_eq!(plan.merged().set["1"], json!("B"));
    assert!(plan.merged().pull.is_empty());
}

#[test]
fn only_the_edited_child_of_a_pull_conflicts() {
    let local = set("2.1.1", json!(4));
    let remote = pull_items(&[(0, "x"), (1, "y")]);

    let plan = PatchMerge::new(&local, &remote).analyze();
    assert_eq!(plan.conflicts().len(), 1);
    assert_eq!(
        plan.conflicts()[0].remote.updates.pull["2"].entries,
        vec![ArrayEntry::new(1, json!("y"))]
    );
    assert_eq!(plan.merged().pull["2"].entries, vec![ArrayEntry::new(0, json!("x"))]);
}

#[test]
fn prefix_match_does_not_cross_sibling_positions() {
    // Position 1 must not capture edits at position 10.
    let local = set("2.10.1", json!(4));
    let remote = pull_items(&[(1, "y")]);
    let plan = PatchMerge::new(&local, &remote).analyze();
    assert!(!plan.has_conflicts());
}

#[test]
fn local_pull_against_remote_nested_edit_defaults_to_local() {
    let local = pull_items(&[(0, "x")]);
    let remote = set("2.0.1", json!(9));

    let plan = PatchMerge::new(&local, &remote).analyze();
    assert_eq!(plan.conflicts().len(), 1);
    assert_eq!(plan.conflicts()[0].auto_decision, ConflictSide::Local);
    assert!(plan.conflicts()[0].local.updates.pull.contains_key("2"));
    assert!(plan.conflicts()[0].remote.updates.set.contains_key("2.0.1"));
}

#[test]
fn both_sides_pulling_the_same_child_is_not_a_conflict() {
    let update = PatchMerge::new(&pull_items(&[(0, "x")]), &pull_items(&[(0, "x")]))
        .run_and_resolve_with(MergeDecision::Auto)
        .unwrap();
    assert_eq!(update.pull["2"].entries, vec![ArrayEntry::new(0, json!("x"))]);
}

// ============================================================================
// Conflict-free union
// ============================================================================

#[test]
fn primitive_pushes_union_by_value() {
    let mut local = PatchUpdate::new();
    local.push.insert("3".into(), tags_op(&["a", "b"]));
    let mut remote = PatchUpdate::new();
    remote.push.insert("3".into(), tags_op(&["b", "c"]));

    let update = PatchMerge::new(&local, &remote)
        .run_and_resolve_with(MergeDecision::Auto)
        .unwrap();
    let values: Vec<_> = update.push["3"].entries.iter().map(|e| e.id_or_value.clone()).collect();
    assert_eq!(values, vec![json!("b"), json!("c"), json!("a")]);
}

#[test]
fn sub_record_pushes_from_both_sides_are_kept() {
    let schema = order_schema();
    let base = order(&schema, "A", vec![item("x", 1)]);
    let local = order(&schema, "A", vec![item("x", 1), item("l", 2)]);
    let remote = order(&schema, "A", vec![item("x", 1), item("r", 3)]);

    let local_patch = Patch::new(&base, &local).unwrap();
    let remote_patch = Patch::new(&base, &remote).unwrap();
    let update = PatchMerge::from_patches(&local_patch, &remote_patch)
        .run_and_resolve_with(MergeDecision::Auto)
        .unwrap();
    assert_eq!(update.push["2"].entries.len(), 2);

    let mut merged = base.clone();
    less_record::apply_update(&update, &mut merged).unwrap();
    assert_eq!(qty_of(&merged, "l"), Some(2));
    assert_eq!(qty_of(&merged, "r"), Some(3));
}

#[test]
fn inputs_are_not_mutated() {
    let local = set("1", json!("L"));
    let remote = set("1", json!("R"));
    let _ = PatchMerge::new(&local, &remote).run_and_resolve_with(MergeDecision::Remote);
    assert_eq!(local.set["1"], json!("L"));
    assert_eq!(remote.set["1"], json!("R"));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn decision_count_must_match() {
    let plan = PatchMerge::new(&set("1", json!("L")), &set("1", json!("R"))).analyze();
    let err = plan.resolve(&[]).unwrap_err();
    assert!(matches!(err, MergeError::DecisionCount { expected: 1, actual: 0 }));
}

#[tokio::test]
async fn resolver_receives_conflicts_in_order() {
    let mut local = set("1", json!("L1"));
    local.set.insert("4".into(), json!(1));
    let mut remote = set("1", json!("R1"));
    remote.set.insert("4".into(), json!(2));

    let update = PatchMerge::new(&local, &remote)
        .run_and_resolve_by(|conflicts| async move {
            assert_eq!(conflicts.len(), 2);
            Ok::<_, io::Error>(vec![MergeDecision::Remote, MergeDecision::Local])
        })
        .await
        .unwrap();
    assert_eq!(update.set["1"], json!("R1"));
    assert_eq!(update.set["4"], json!(1));
}

#[tokio::test]
async fn resolver_is_skipped_without_conflicts() {
    let update = PatchMerge::new(&set("1", json!("B")), &PatchUpdate::new())
        .run_and_resolve_by(|_| async { Err::<Vec<MergeDecision>, _>(io::Error::other("must not be called")) })
        .await
        .unwrap();
    assert_eq!(update.set["1"], json!("B"));
}

#[tokio::test]
async fn resolver_errors_are_wrapped() {
    let err = PatchMerge::new(&set("1", json!("L")), &set("1", json!("R")))
        .run_and_resolve_by(|_| async { Err::<Vec<MergeDecision>, _>(io::Error::other("user cancelled")) })
        .await
        .unwrap_err();
    match err {
        MergeError::Resolver { source } => assert_eq!(source.to_string(), "user cancelled"),
        other => panic!("unexpected error: {other}"),
    }
}
