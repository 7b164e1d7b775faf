//! Tests for `execute_find`: filtering, ordering, pagination and projection.

use rx_collection::query::execute::{execute_find, project, sort_documents};
use rx_collection::{FindOptions, QueryError, SortEntry, Transform};
use serde_json::{json, Map, Value};

fn people() -> Vec<Value> {
    vec![
        json!({ "_id": "1", "name": "Cara", "age": 41, "city": "Oslo" }),
        json!({ "_id": "2", "name": "Abe", "age": 29, "city": "Rome" }),
        json!({ "_id": "3", "name": "Bea", "age": 35, "city": "Oslo" }),
        json!({ "_id": "4", "name": "Dan", "city": "Rome" }),
    ]
}

fn names(docs: &[Value]) -> Vec<&str> {
    docs.iter().filter_map(|d| d["name"].as_str()).collect()
}

fn fields(projection: Value) -> Map<String, Value> {
    projection.as_object().cloned().unwrap_or_default()
}

#[test]
fn no_options_keeps_insertion_order() {
    let docs = people();
    let out = execute_find(&docs, &json!({ "city": "Oslo" }), &FindOptions::default()).unwrap();
    assert_eq!(names(&out), vec!["Cara", "Bea"]);
}

#[test]
fn sort_cascades_across_fields_and_desc_puts_missing_first() {
    let mut docs = people();
    sort_documents(&mut docs, &[SortEntry::asc("city"), SortEntry::desc("age")]);
    assert_eq!(names(&docs), vec!["Cara", "Bea", "Dan", "Abe"]);
}

#[test]
fn missing_sort_field_goes_last_ascending() {
    let docs = people();
    let options = FindOptions {
        sort: Some(vec![SortEntry::asc("age")]),
        ..Default::default()
    };
    let out = execute_find(&docs, &json!({}), &options).unwrap();
    assert_eq!(names(&out), vec!["Abe", "Bea", "Cara", "Dan"]);
}

#[test]
fn skip_and_limit_page_after_sorting() {
    let docs = people();
    let options = FindOptions {
        sort: Some(vec![SortEntry::asc("name")]),
        skip: Some(1),
        limit: Some(2),
        ..Default::default()
    };
    let out = execute_find(&docs, &json!({}), &options).unwrap();
    assert_eq!(names(&out), vec!["Bea", "Cara"]);
}

#[test]
fn inclusion_projection_keeps_id_by_default() {
    let doc = json!({ "_id": "1", "name": "Cara", "age": 41 });
    assert_eq!(
        project(doc.clone(), &fields(json!({ "name": 1 }))).unwrap(),
        json!({ "_id": "1", "name": "Cara" })
    );
    assert_eq!(
        project(doc, &fields(json!({ "name": 1, "_id": 0 }))).unwrap(),
        json!({ "name": "Cara" })
    );
}

#[test]
fn exclusion_projection_drops_fields() {
    let doc = json!({ "_id": "1", "name": "Cara", "age": 41 });
    assert_eq!(
        project(doc, &fields(json!({ "age": 0 }))).unwrap(),
        json!({ "_id": "1", "name": "Cara" })
    );
}

#[test]
fn mixed_projection_is_rejected() {
    let err = project(json!({}), &fields(json!({ "a": 1, "b": 0 }))).unwrap_err();
    assert!(matches!(err, QueryError::InvalidOperand(_)));
}

#[test]
fn transform_runs_after_projection() {
    let docs = people();
    let options = FindOptions {
        fields: Some(fields(json!({ "name": 1 }))),
        transform: Some(Transform::new(|doc| {
            json!({ "upper": doc["name"].as_str().unwrap_or_default().to_uppercase(), "age": doc.get("age") })
        })),
        limit: Some(1),
        ..Default::default()
    };
    let out = execute_find(&docs, &json!({}), &options).unwrap();
    assert_eq!(out, vec![json!({ "upper": "CARA", "age": null })]);
}

#[test]
fn selector_errors_propagate() {
    let docs = people();
    assert!(execute_find(&docs, &json!({ "$bogus": 1 }), &FindOptions::default()).is_err());
}
