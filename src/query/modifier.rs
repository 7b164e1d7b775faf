//! Update modifiers: `$set`, `$unset`, `$inc`, `$push`, `$addToSet`, `$pull`,
//! `$setOnInsert`, or a whole-document replacement.

use serde_json::{Map, Value};

use crate::error::QueryError;

use super::selector::{get_path, matches};

/// Whether `modifier` uses `$` operators (as opposed to being a replacement
/// document). Mixing both forms is rejected.
pub fn is_operator_modifier(modifier: &Value) -> Result<bool, QueryError> {
    let obj = modifier
        .as_object()
        .ok_or_else(|| QueryError::InvalidModifier("modifier must be an object".to_string()))?;
    let ops = obj.keys().filter(|k| k.starts_with('$')).count();
    match ops {
        0 => Ok(false),
        n if n == obj.len() => Ok(true),
        _ => Err(QueryError::InvalidModifier(
            "cannot mix update operators with plain fields".to_string(),
        )),
    }
}

/// Top-level field names a modifier touches. For a replacement, every key.
pub fn modified_fields(modifier: &Value) -> Vec<String> {
    let Some(obj) = modifier.as_object() else {
        return Vec::new();
    };
    let mut fields: Vec<String> = Vec::new();
    let mut add = |path: &str| {
        let top = path.split('.').next().unwrap_or(path).to_string();
        if !fields.contains(&top) {
            fields.push(top);
        }
    };
    for (key, value) in obj {
        if key.starts_with('$') {
            if let Some(inner) = value.as_object() {
                inner.keys().for_each(|k| add(k.as_str()));
            }
        } else {
            add(key.as_str());
        }
    }
    fields
}

/// Apply `modifier` to `doc`, returning the new document.
///
/// `inserting` enables `$setOnInsert`. The `_id` field is preserved on
/// replacement and may not be changed by operators.
pub fn apply_modifier(doc: &Value, modifier: &Value, inserting: bool) -> Result<Value, QueryError> {
    let id = doc.get("_id").cloned();

    if !is_operator_modifier(modifier)? {
        let mut replacement = modifier.as_object().cloned().unwrap_or_default();
        if let Some(new_id) = replacement.get("_id") {
            if Some(new_id) != id.as_ref() {
                return Err(QueryError::ImmutableId);
            }
        }
        if let Some(id) = id {
            replacement.insert("_id".to_string(), id);
        }
        return Ok(Value::Object(replacement));
    }

    let mut out = doc.clone();
    for (op, fields) in modifier.as_object().into_iter().flatten() {
        let fields = fields
            .as_object()
            .ok_or_else(|| QueryError::InvalidModifier(format!("{op} needs an object")))?;
        for (path, operand) in fields {
            if path == "_id" || path.starts_with("_id.") {
                if op == "$setOnInsert" || (op == "$set" && Some(operand) == id.as_ref()) {
                    continue;
                }
                return Err(QueryError::ImmutableId);
            }
            apply_operator(&mut out, op, path, operand, inserting)?;
        }
    }
    Ok(out)
}

fn apply_operator(
    doc: &mut Value,
    op: &str,
    path: &str,
    operand: &Value,
    inserting: bool,
) -> Result<(), QueryError> {
    match op {
        "$set" => set_path(doc, path, operand.clone()),
        "$setOnInsert" => {
            if inserting {
                set_path(doc, path, operand.clone())?;
            }
            Ok(())
        }
        "$unset" => {
            unset_path(doc, path);
            Ok(())
        }
        "$inc" => {
            let by = operand
                .as_f64()
                .ok_or_else(|| QueryError::InvalidModifier(format!("$inc on {path} needs a number")))?;
            let next = match get_path(doc, path) {
                None | Some(Value::Null) => operand.clone(),
                Some(Value::Number(n)) => add_numbers(n, operand, by),
                Some(_) => {
                    return Err(QueryError::InvalidModifier(format!(
                        "$inc on non-numeric field {path}"
                    )))
                }
            };
            set_path(doc, path, next)
        }
        "$push" | "$addToSet" => {
            let mut items = match get_path(doc, path) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.clone(),
                Some(_) => {
                    return Err(QueryError::InvalidModifier(format!("{op} on non-array field {path}")))
                }
            };
            let values = match operand.get("$each").and_then(Value::as_array) {
                Some(each) => each.clone(),
                None => vec![operand.clone()],
            };
            for v in values {
                if op == "$push" || !items.contains(&v) {
                    items.push(v);
                }
            }
            set_path(doc, path, Value::Array(items))
        }
        "$pull" => {
            if let Some(Value::Array(items)) = get_path(doc, path) {
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    let pulled = if operand.is_object() && item.is_object() {
                        matches(item, operand)?
                    } else {
                        item == operand
                    };
                    if !pulled {
                        kept.push(item.clone());
                    }
                }
                set_path(doc, path, Value::Array(kept))?;
            }
            Ok(())
        }
        other => Err(QueryError::UnknownOperator(other.to_string())),
    }
}

fn add_numbers(current: &serde_json::Number, operand: &Value, by: f64) -> Value {
    match (current.as_i64(), operand.as_i64()) {
        (Some(a), Some(b)) => Value::from(a.saturating_add(b)),
        _ => serde_json::Number::from_f64(current.as_f64().unwrap_or(0.0) + by)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// Set a dot-separated path, creating intermediate objects.
fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<(), QueryError> {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((leaf, parents)) = parts.split_last() else {
        return Ok(());
    };
    let not_object = || QueryError::InvalidModifier(format!("cannot set {path}: parent is not an object"));

    let mut current = doc;
    for part in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(m) = current else {
            return Err(not_object());
        };
        current = m
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(m) => {
            m.insert(leaf.to_string(), value);
            Ok(())
        }
        _ => Err(not_object()),
    }
}

fn unset_path(doc: &mut Value, path: &str) {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (parent, leaf),
        None => {
            if let Value::Object(m) = doc {
                m.remove(path);
            }
            return;
        }
    };
    let mut current = doc;
    for part in parent.split('.') {
        current = match current {
            Value::Object(m) => match m.get_mut(part) {
                Some(v) => v,
                None => return,
            },
            _ => return,
        };
    }
    if let Value::Object(m) = current {
        m.remove(leaf);
    }
}
