//! Tests for selector matching and value ordering.

use std::cmp::Ordering;

use rx_collection::query::selector::{compare_values, equality_fields, get_path, matches};
use rx_collection::QueryError;
use serde_json::{json, Value};

fn hit(doc: Value, selector: Value) -> bool {
    matches(&doc, &selector).expect("valid selector")
}

// ============================================================================
// compare_values
// ============================================================================

#[test]
fn nulls_sort_last() {
    assert_eq!(compare_values(&Value::Null, &json!(1)), Ordering::Greater);
    assert_eq!(compare_values(&json!(1), &Value::Null), Ordering::Less);
    assert_eq!(compare_values(&Value::Null, &Value::Null), Ordering::Equal);
}

#[test]
fn numbers_compare_across_int_and_float() {
    assert_eq!(compare_values(&json!(1), &json!(1.5)), Ordering::Less);
    assert_eq!(compare_values(&json!(2.0), &json!(2)), Ordering::Equal);
}

#[test]
fn strings_compare_lexicographically() {
    assert_eq!(compare_values(&json!("apple"), &json!("banana")), Ordering::Less);
}

#[test]
fn mixed_types_use_type_rank() {
    assert_eq!(compare_values(&json!(5), &json!("5")), Ordering::Less);
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn get_path_walks_objects_and_array_indexes() {
    let doc = json!({ "a": { "b": [10, { "c": 3 }] } });
    assert_eq!(get_path(&doc, "a.b.0"), Some(&json!(10)));
    assert_eq!(get_path(&doc, "a.b.1.c"), Some(&json!(3)));
    assert_eq!(get_path(&doc, "a.x"), None);
}

// ============================================================================
// Field conditions
// ============================================================================

#[test]
fn literal_equality_and_empty_selector() {
    assert!(hit(json!({ "v": 1 }), json!({ "v": 1 })));
    assert!(!hit(json!({ "v": 2 }), json!({ "v": 1 })));
    assert!(hit(json!({ "v": 2 }), json!({})));
}

#[test]
fn equality_lifts_over_arrays() {
    assert!(hit(json!({ "tags": ["a", "b"] }), json!({ "tags": "b" })));
    assert!(hit(json!({ "tags": ["a", "b"] }), json!({ "tags": ["a", "b"] })));
}

#[test]
fn range_operators_require_matching_types() {
    let doc = json!({ "n": 5, "s": "m" });
    assert!(hit(doc.clone(), json!({ "n": { "$gt": 4, "$lte": 5 } })));
    assert!(!hit(doc.clone(), json!({ "n": { "$lt": "9" } })));
    assert!(hit(doc, json!({ "s": { "$gte": "a" } })));
}

#[test]
fn missing_fields_never_satisfy_ranges() {
    assert!(!hit(json!({}), json!({ "n": { "$gt": 0 } })));
    assert!(!hit(json!({}), json!({ "n": { "$lt": 0 } })));
}

#[test]
fn ne_and_nin_match_missing_fields() {
    assert!(hit(json!({}), json!({ "n": { "$ne": 1 } })));
    assert!(hit(json!({ "n": 2 }), json!({ "n": { "$nin": [1, 3] } })));
    assert!(!hit(json!({ "n": 3 }), json!({ "n": { "$nin": [1, 3] } })));
}

#[test]
fn in_matches_any_listed_value() {
    assert!(hit(json!({ "c": "red" }), json!({ "c": { "$in": ["red", "blue"] } })));
    assert!(hit(json!({ "c": ["green", "blue"] }), json!({ "c": { "$in": ["blue"] } })));
}

#[test]
fn exists_size_and_all() {
    let doc = json!({ "tags": ["a", "b", "c"] });
    assert!(hit(doc.clone(), json!({ "tags": { "$exists": true } })));
    assert!(hit(doc.clone(), json!({ "other": { "$exists": false } })));
    assert!(hit(doc.clone(), json!({ "tags": { "$size": 3 } })));
    assert!(hit(doc.clone(), json!({ "tags": { "$all": ["c", "a"] } })));
    assert!(!hit(doc, json!({ "tags": { "$all": ["a", "z"] } })));
}

#[test]
fn regex_and_not() {
    assert!(hit(json!({ "name": "Alice" }), json!({ "name": { "$regex": "^Al" } })));
    assert!(hit(json!({ "name": "Bob" }), json!({ "name": { "$not": { "$regex": "^Al" } } })));
}

#[test]
fn logical_operators_combine_sub_selectors() {
    let doc = json!({ "a": 1, "b": 2 });
    assert!(hit(doc.clone(), json!({ "$and": [{ "a": 1 }, { "b": 2 }] })));
    assert!(hit(doc.clone(), json!({ "$or": [{ "a": 9 }, { "b": 2 }] })));
    assert!(!hit(doc, json!({ "$nor": [{ "a": 1 }] })));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn unknown_operators_are_errors() {
    assert_eq!(
        matches(&json!({}), &json!({ "n": { "$near": 1 } })),
        Err(QueryError::UnknownOperator("$near".to_string()))
    );
    assert_eq!(
        matches(&json!({}), &json!({ "$where": "true" })),
        Err(QueryError::UnknownOperator("$where".to_string()))
    );
}

#[test]
fn bad_regex_is_reported() {
    assert!(matches!(
        matches(&json!({ "s": "x" }), &json!({ "s": { "$regex": "(" } })),
        Err(QueryError::InvalidRegex(_))
    ));
}

#[test]
fn in_requires_an_array() {
    assert!(matches!(
        matches(&json!({ "c": 1 }), &json!({ "c": { "$in": 1 } })),
        Err(QueryError::InvalidOperand(_))
    ));
}

// ============================================================================
// equality_fields
// ============================================================================

#[test]
fn equality_fields_keep_literals_and_eq() {
    let fields = equality_fields(&json!({
        "slug": "home",
        "n": { "$eq": 2 },
        "age": { "$gt": 3 },
        "$or": [{ "x": 1 }],
    }));
    assert_eq!(Value::Object(fields), json!({ "slug": "home", "n": 2 }));
}
