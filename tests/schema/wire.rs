use less_record::schema::{FieldDesc, Schema};
use less_record::Record;
use serde_json::json;

use crate::common::*;

#[test]
fn payload_to_document_groups_by_segment() {
    let schema = order_schema();
    let record = with_tags(order(&schema, "A", vec![item("x", 2)]), &["t"]);
    let document = record.to_document().unwrap();
    assert_eq!(
        document,
        json!({
            "root": {
                "_id": "order-1",
                "name": "A",
                "items": [{"root": {"_id": "x", "qty": 2, "label": ""}}],
                "tags": ["t"]
            },
            "customer": {"age": 0}
        })
    );
}

#[test]
fn document_round_trips_to_the_same_payload() {
    let schema = order_schema();
    let record = order(&schema, "A", vec![item("x", 2), item("y", 3)]);
    let document = record.to_document().unwrap();
    let back = Record::from_document(schema.clone(), &document).unwrap();
    assert_eq!(back.payload(), record.payload());
}

#[test]
fn missing_keys_take_defaults_and_generate_an_id() {
    let schema = order_schema();
    let record = Record::from_document(schema.clone(), &json!({"root": {"name": "only"}})).unwrap();
    assert_eq!(record.get(NAME).unwrap(), &json!("only"));
    assert_eq!(record.get(ITEMS).unwrap(), &json!([]));
    assert_eq!(record.id().len(), less_record::record::ID_LENGTH);
}

#[test]
fn date_fields_normalise_on_read() {
    let schema = Schema::builder("t").field("due", FieldDesc::date("Due")).build();
    let payload = schema
        .document_to_payload(&json!({"root": {"_id": "r", "due": "2024-03-01T08:00:00+01:00"}}))
        .unwrap();
    assert_eq!(payload[1], json!("2024-03-01T07:00:00.000Z"));
}
