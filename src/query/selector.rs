//! Selector evaluation for the in-memory store.
//! Mongo-style field conditions with array lifting.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::QueryError;

// ============================================================================
// Value Comparison
// ============================================================================

/// Total order over JSON values used by range operators and sorting.
///
/// Nulls sort last; numbers compare as `f64`; strings by codepoint; `false <
/// true`; values of different types fall back to a fixed type rank.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(f64::NAN);
            let fb = nb.as_f64().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Object(_) => 2,
        Value::Array(_) => 3,
        Value::Bool(_) => 4,
        Value::Null => 5,
    }
}

/// Numeric-aware equality: `1` and `1.0` are equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => na.as_f64() == nb.as_f64(),
        _ => a == b,
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Resolve a dot-separated path. `None` if any segment is missing.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = match current {
            Value::Object(m) => m.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_object(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) if !obj.is_empty() => obj.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Range and equality operators lift over arrays: any element may match.
fn lifted(value: Option<&Value>, test: impl Fn(&Value) -> bool) -> bool {
    match value {
        Some(Value::Array(items)) => items.iter().any(&test) || test(&Value::Array(items.clone())),
        Some(v) => test(v),
        None => test(&Value::Null),
    }
}

fn range(value: Option<&Value>, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    if operand.is_null() {
        return false;
    }
    lifted(value, |v| {
        !v.is_null() && type_rank(v) == type_rank(operand) && accept(compare_values(v, operand))
    })
}

fn in_list(value: Option<&Value>, operand: &Value) -> Result<bool, QueryError> {
    let items = operand
        .as_array()
        .ok_or_else(|| QueryError::InvalidOperand("$in needs an array".to_string()))?;
    Ok(lifted(value, |v| items.iter().any(|item| values_equal(v, item))))
}

fn evaluate_operator(value: Option<&Value>, op: &str, operand: &Value) -> Result<bool, QueryError> {
    match op {
        "$eq" => Ok(lifted(value, |v| values_equal(v, operand))),
        "$ne" => Ok(!lifted(value, |v| values_equal(v, operand))),
        "$gt" => Ok(range(value, operand, |o| o == Ordering::Greater)),
        "$gte" => Ok(range(value, operand, |o| o != Ordering::Less)),
        "$lt" => Ok(range(value, operand, |o| o == Ordering::Less)),
        "$lte" => Ok(range(value, operand, |o| o != Ordering::Greater)),
        "$in" => in_list(value, operand),
        "$nin" => Ok(!in_list(value, operand)?),
        "$exists" => Ok(value.is_some() == operand.as_bool().unwrap_or(true)),
        "$size" => Ok(match (value.and_then(Value::as_array), operand.as_u64()) {
            (Some(items), Some(n)) => items.len() as u64 == n,
            _ => false,
        }),
        "$all" => {
            let wanted = operand
                .as_array()
                .ok_or_else(|| QueryError::InvalidOperand("$all needs an array".to_string()))?;
            Ok(match value.and_then(Value::as_array) {
                Some(items) => wanted
                    .iter()
                    .all(|w| items.iter().any(|item| values_equal(item, w))),
                None => false,
            })
        }
        "$regex" => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| QueryError::InvalidRegex(operand.to_string()))?;
            let re = regex::Regex::new(pattern)
                .map_err(|e| QueryError::InvalidRegex(e.to_string()))?;
            Ok(lifted(value, |v| v.as_str().is_some_and(|s| re.is_match(s))))
        }
        "$not" => Ok(!evaluate_condition(value, operand)?),
        other => Err(QueryError::UnknownOperator(other.to_string())),
    }
}

/// Evaluate a field condition: an operator object or a literal (implicit `$eq`).
fn evaluate_condition(value: Option<&Value>, condition: &Value) -> Result<bool, QueryError> {
    match condition.as_object() {
        Some(ops) if is_operator_object(condition) => {
            for (op, operand) in ops {
                if !evaluate_operator(value, op, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => evaluate_operator(value, "$eq", condition),
    }
}

// ============================================================================
// Selector matching
// ============================================================================

/// Whether `doc` satisfies `selector`.
///
/// Top-level `$and` / `$or` / `$nor` combine sub-selectors; every other key
/// is a field path whose condition must hold (implicit AND). A non-object
/// selector matches everything.
pub fn matches(doc: &Value, selector: &Value) -> Result<bool, QueryError> {
    let Some(clauses) = selector.as_object() else {
        return Ok(true);
    };

    for (key, condition) in clauses {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_selectors(key, condition)? {
                    if !matches(doc, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => any_matches(doc, sub_selectors(key, condition)?)?,
            "$nor" => !any_matches(doc, sub_selectors(key, condition)?)?,
            k if k.starts_with('$') => return Err(QueryError::UnknownOperator(k.to_string())),
            path => evaluate_condition(get_path(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_selectors<'a>(op: &str, value: &'a Value) -> Result<&'a Vec<Value>, QueryError> {
    value
        .as_array()
        .ok_or_else(|| QueryError::InvalidOperand(format!("{op} needs an array")))
}

fn any_matches(doc: &Value, selectors: &[Value]) -> Result<bool, QueryError> {
    for sub in selectors {
        if matches(doc, sub)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Literal field equalities of a selector, used to seed an upserted document.
pub fn equality_fields(selector: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(clauses) = selector.as_object() {
        for (key, condition) in clauses {
            if key.starts_with('$') {
                continue;
            }
            if is_operator_object(condition) {
                if let Some(eq) = condition.get("$eq") {
                    out.insert(key.clone(), eq.clone());
                }
                continue;
            }
            out.insert(key.clone(), condition.clone());
        }
    }
    out
}

// ============================================================================
// Tests (inline unit tests)
// ============================================================================
