use std::sync::Arc;

use async_trait::async_trait;
use less_record::branch::ResolverError;
use less_record::error::{LessRecordError, MergeError};
use less_record::patch::MergeConflict;
use less_record::{MergeDecision, Record, SelectionBranch, SelectionConflictResolver};
use parking_lot::Mutex;
use serde_json::json;

use crate::common::*;

fn named(schema: &Arc<less_record::Schema>, id: &str, name: &str) -> Record {
    let mut record = order(schema, name, vec![]);
    record.set(0, json!(id)).unwrap();
    record
}

fn ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

/// Collects every refresh into a shared log.
fn logging_selection() -> (SelectionBranch, Arc<Mutex<Vec<Vec<String>>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let selection = SelectionBranch::new(move |records| sink.lock().push(ids(records)));
    (selection, log)
}

#[tokio::test]
async fn first_merge_creates_branches_in_incoming_order() {
    let schema = order_schema();
    let (mut selection, log) = logging_selection();

    let had_conflicts = selection
        .merge_with(vec![named(&schema, "b", "B"), named(&schema, "a", "A")], &MergeDecision::Auto)
        .await
        .unwrap();

    assert!(!had_conflicts);
    assert_eq!(ids(&selection.currents()), vec!["b", "a"]);
    assert_eq!(*log.lock(), vec![vec!["b".to_string(), "a".to_string()]]);
}

#[tokio::test]
async fn duplicate_incoming_ids_are_skipped() {
    let schema = order_schema();
    let (mut selection, _log) = logging_selection();
    selection
        .merge_with(
            vec![named(&schema, "a", "first"), named(&schema, "a", "second")],
            &MergeDecision::Auto,
        )
        .await
        .unwrap();

    assert_eq!(selection.branches().len(), 1);
    assert_eq!(
        selection.branch("a").unwrap().current().unwrap().get(NAME).unwrap(),
        &json!("first")
    );
}

#[tokio::test]
async fn existing_branches_keep_local_edits_and_missing_ones_drop() {
    let schema = order_schema();
    let (mut selection, log) = logging_selection();
    selection
        .merge_with(vec![named(&schema, "a", "A"), named(&schema, "b", "B")], &MergeDecision::Auto)
        .await
        .unwrap();

    assert!(selection.edit("a", |s| s.set(AGE, json!(50))).unwrap());
    assert!(!selection.edit("zzz", |s| s.set(AGE, json!(1))).unwrap());
    assert_eq!(log.lock().len(), 2);

    let mut upstream_a = named(&schema, "a", "A2");
    upstream_a.set_metadata("rev", json!(2));
    selection
        .merge_with(vec![named(&schema, "c", "C"), upstream_a], &MergeDecision::Auto)
        .await
        .unwrap();

    assert_eq!(ids(&selection.currents()), vec!["c", "a"]);
    let a = selection.branch("a").unwrap().current().unwrap();
    assert_eq!(a.get(NAME).unwrap(), &json!("A2"));
    assert_eq!(a.get(AGE).unwrap(), &json!(50));
    assert_eq!(a.metadata("rev"), Some(&json!(2)));
    assert!(selection.branch("b").is_none());
}

struct RecordingResolver {
    seen: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl SelectionConflictResolver for RecordingResolver {
    async fn resolve(
        &self,
        record: &Record,
        conflicts: Vec<MergeConflict>,
    ) -> Result<Vec<MergeDecision>, ResolverError> {
        self.seen.lock().push((record.id().to_string(), conflicts.len()));
        Ok(vec![MergeDecision::Remote; conflicts.len()])
    }
}

#[tokio::test]
async fn custom_resolver_sees_the_conflicting_record() {
    let schema = order_schema();
    let (mut selection, _log) = logging_selection();
    selection
        .merge_with(vec![named(&schema, "a", "A")], &MergeDecision::Auto)
        .await
        .unwrap();
    selection.edit("a", |s| s.set(NAME, json!("mine"))).unwrap();

    let resolver = RecordingResolver {
        seen: Mutex::new(Vec::new()),
    };
    let had_conflicts = selection
        .merge_with(vec![named(&schema, "a", "theirs")], &resolver)
        .await
        .unwrap();

    assert!(had_conflicts);
    assert_eq!(*resolver.seen.lock(), vec![("a".to_string(), 1)]);
    assert_eq!(
        selection.branch("a").unwrap().current().unwrap().get(NAME).unwrap(),
        &json!("theirs")
    );
}

#[tokio::test]
async fn resolver_can_be_a_trait_object() {
    let schema = order_schema();
    let (mut selection, _log) = logging_selection();
    let resolver: Box<dyn SelectionConflictResolver> = Box::new(MergeDecision::Local);
    selection
        .merge_with(vec![named(&schema, "a", "A")], resolver.as_ref())
        .await
        .unwrap();
    selection.edit("a", |s| s.set(NAME, json!("mine"))).unwrap();
    selection
        .merge_with(vec![named(&schema, "a", "theirs")], resolver.as_ref())
        .await
        .unwrap();
    assert_eq!(
        selection.branch("a").unwrap().current().unwrap().get(NAME).unwrap(),
        &json!("mine")
    );
}

/// Answers with the remote side, except for `failing_id` where it errors.
struct FailingResolver {
    failing_id: &'static str,
}

#[async_trait]
impl SelectionConflictResolver for FailingResolver {
    async fn resolve(
        &self,
        record: &Record,
        conflicts: Vec<MergeConflict>,
    ) -> Result<Vec<MergeDecision>, ResolverError> {
        if record.id() == self.failing_id {
            return Err("resolver unavailable".into());
        }
        Ok(vec![MergeDecision::Remote; conflicts.len()])
    }
}

#[tokio::test]
async fn failed_resolver_leaves_every_branch_unchanged() {
    let schema = order_schema();
    let (mut selection, log) = logging_selection();
    selection
        .merge_with(vec![named(&schema, "a", "a"), named(&schema, "b", "b")], &MergeDecision::Auto)
        .await
        .unwrap();
    selection.edit("a", |s| s.set(NAME, json!("a-mine"))).unwrap();
    selection.edit("b", |s| s.set(NAME, json!("b-mine"))).unwrap();
    let refreshes = log.lock().len();

    let err = selection
        .merge_with(
            vec![named(&schema, "a", "a-remote"), named(&schema, "b", "b-remote")],
            &FailingResolver { failing_id: "b" },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LessRecordError::Merge(MergeError::Resolver { .. })
    ));

    let a = selection.branch("a").unwrap();
    assert_eq!(a.initial().unwrap().get(NAME).unwrap(), &json!("a"));
    assert_eq!(a.current().unwrap().get(NAME).unwrap(), &json!("a-mine"));
    let b = selection.branch("b").unwrap();
    assert_eq!(b.current().unwrap().get(NAME).unwrap(), &json!("b-mine"));
    assert_eq!(log.lock().len(), refreshes);
}
