use std::sync::Arc;

use less_record::error::{LessRecordError, PatchError};
use less_record::patch::{ArrayDataType, ArrayEntry, Patch};
use less_record::schema::{FieldDesc, Schema};
use less_record::Record;
use serde_json::json;

use crate::common::*;

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn identical_records_produce_empty_patch() {
    let schema = order_schema();
    let a = order(&schema, "A", vec![item("x", 1)]);
    let patch = Patch::new(&a, &a.clone()).unwrap();
    assert!(patch.is_empty());
}

#[test]
fn scalar_change_becomes_set() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![]);
    let mut new = old.clone();
    new.set(NAME, json!("B")).unwrap();
    new.set(AGE, json!(42)).unwrap();

    let update = Patch::new(&old, &new).unwrap().into_updates();
    assert_eq!(update.set.len(), 2);
    assert_eq!(update.set["1"], json!("B"));
    assert_eq!(update.set["4"], json!(42));
    assert!(update.push.is_empty());
    assert!(update.pull.is_empty());
}

// ============================================================================
// Primitive arrays
// ============================================================================

#[test]
fn primitive_arrays_diff_as_sets() {
    let schema = order_schema();
    let old = with_tags(order(&schema, "A", vec![]), &["a", "b", "c"]);
    let new = with_tags(order(&schema, "A", vec![]), &["c", "a", "d"]);

    let update = Patch::new(&old, &new).unwrap().into_updates();
    let pushed = &update.push["3"];
    assert_eq!(pushed.data_type, ArrayDataType::Primitive);
    assert_eq!(pushed.entries, vec![ArrayEntry::new(2, json!("d"))]);
    let pulled = &update.pull["3"];
    assert_eq!(pulled.entries, vec![ArrayEntry::new(1, json!("b"))]);
    assert!(update.set.is_empty());
}

#[test]
fn reordered_primitive_array_is_unchanged() {
    let schema = order_schema();
    let old = with_tags(order(&schema, "A", vec![]), &["a", "b"]);
    let new = with_tags(order(&schema, "A", vec![]), &["b", "a"]);
    assert!(Patch::new(&old, &new).unwrap().is_empty());
}

// ============================================================================
// Sub-records
// ============================================================================

#[test]
fn sub_records_are_matched_by_id() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![item("x", 1), item("y", 2)]);
    let new = order(&schema, "A", vec![item("y", 2), item("x", 1)]);
    assert!(Patch::new(&old, &new).unwrap().is_empty());
}

#[test]
fn nested_change_uses_old_position() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![item("x", 1), item("y", 2)]);
    let new = order(&schema, "A", vec![item("y", 7), item("x", 1)]);

    let update = Patch::new(&old, &new).unwrap().into_updates();
    assert_eq!(update.set.len(), 1);
    assert_eq!(update.set["2.1.1"], json!(7));
}

#[test]
fn added_and_removed_sub_records() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![item("x", 1), item("y", 2)]);
    let new = order(&schema, "A", vec![item("y", 2), item("z", 3)]);

    let update = Patch::new(&old, &new).unwrap().into_updates();
    let pulled = &update.pull["2"];
    assert_eq!(pulled.data_type, ArrayDataType::SubRecord);
    assert_eq!(pulled.entries, vec![ArrayEntry::new(0, json!("x"))]);

    let pushed = &update.push["2"];
    assert_eq!(pushed.data_type, ArrayDataType::SubRecord);
    assert_eq!(pushed.entries, vec![ArrayEntry::new(1, item("z", 3))]);
    assert!(update.set.is_empty());
}

#[test]
fn nested_sub_record_arrays_recurse() {
    let leaf = Schema::builder("t").sub_ident("leaf").field("v", FieldDesc::integer("V")).build();
    let mid = Schema::builder("t")
        .sub_ident("mid")
        .field("leaves", FieldDesc::sub_records("Leaves", leaf))
        .build();
    let root = Schema::builder("t").field("mids", FieldDesc::sub_records("Mids", mid)).build();

    let old = Record::from_payload(
        Arc::clone(&root),
        vec![json!("r"), json!([["m1", [["l1", 1], ["l2", 2]]]])],
    )
    .unwrap();
    let new = Record::from_payload(
        Arc::clone(&root),
        vec![json!("r"), json!([["m1", [["l2", 5], ["l3", 3]]]])],
    )
    .unwrap();

    let update = Patch::new(&old, &new).unwrap().into_updates();
    assert_eq!(update.set["1.0.1.1.1"], json!(5));
    assert_eq!(update.pull["1.0.1"].entries, vec![ArrayEntry::new(0, json!("l1"))]);
    assert_eq!(update.push["1.0.1"].entries, vec![ArrayEntry::new(1, json!(["l3", 3]))]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn payload_length_mismatch_is_fatal() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![]);
    let short = vec![json!("order-1"), json!("A")];
    let err = Patch::between(&schema, old.payload(), &short).unwrap_err();
    assert!(matches!(
        err,
        LessRecordError::Patch(PatchError::LengthMismatch { old: 5, new: 2, .. })
    ));
}

#[test]
fn nested_payload_length_mismatch_reports_path() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![item("x", 1)]);
    let mut new = old.clone();
    new.set(ITEMS, json!([["x", 1]])).unwrap();
    let err = Patch::new(&old, &new).unwrap_err();
    match err {
        LessRecordError::Patch(PatchError::LengthMismatch { path, .. }) => assert_eq!(path, "2.0"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn pushed_sub_record_of_wrong_length_is_rejected() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![item("x", 1)]);
    let mut new = old.clone();
    new.set(ITEMS, json!([["x", 1, ""], ["z"]])).unwrap();

    match Patch::new(&old, &new).unwrap_err() {
        LessRecordError::Patch(PatchError::SubRecordLength { path, expected, actual }) => {
            assert_eq!(path, "2.1");
            assert_eq!((expected, actual), (3, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sub_record_without_id_is_rejected() {
    let schema = order_schema();
    let old = order(&schema, "A", vec![]);
    let mut new = old.clone();
    new.set(ITEMS, json!([[1, 1, ""]])).unwrap();
    let err = Patch::new(&old, &new).unwrap_err();
    assert!(matches!(
        err,
        LessRecordError::Patch(PatchError::MalformedSubRecord { .. })
    ));
}
