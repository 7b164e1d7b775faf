//! Query execution: scan-and-filter with sorting, pagination and projection.

use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::types::{FindOptions, SortDirection, SortEntry};

use super::selector::{compare_values, get_path, matches};

/// Sort documents by multiple fields with cascading priority.
pub fn sort_documents(docs: &mut [Value], sort: &[SortEntry]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for entry in sort {
            let va = get_path(a, &entry.field).unwrap_or(&Value::Null);
            let vb = get_path(b, &entry.field).unwrap_or(&Value::Null);
            let cmp = compare_values(va, vb);
            if cmp != std::cmp::Ordering::Equal {
                return match entry.direction {
                    SortDirection::Desc => cmp.reverse(),
                    SortDirection::Asc => cmp,
                };
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Apply a `{field: 0|1}` projection. Inclusion and exclusion may not be
/// mixed, except for `_id` which is always included unless excluded.
pub fn project(doc: Value, fields: &Map<String, Value>) -> Result<Value, QueryError> {
    let Value::Object(mut obj) = doc else {
        return Ok(doc);
    };
    let is_on = |v: &Value| v.as_bool().unwrap_or_else(|| v.as_f64().is_some_and(|n| n != 0.0));
    let (includes, excludes): (Vec<(&String, &Value)>, Vec<(&String, &Value)>) = fields
        .iter()
        .filter(|(k, _)| *k != "_id")
        .partition(|(_, v)| is_on(*v));
    if !includes.is_empty() && !excludes.is_empty() {
        return Err(QueryError::InvalidOperand(
            "projection cannot mix inclusion and exclusion".to_string(),
        ));
    }
    let keep_id = fields.get("_id").map_or(true, is_on);

    if !includes.is_empty() {
        let id = obj.remove("_id");
        let mut out = Map::new();
        for (key, _) in includes {
            if let Some(v) = obj.remove(key.as_str()) {
                out.insert(key.clone(), v);
            }
        }
        if let (true, Some(id)) = (keep_id, id) {
            out.insert("_id".to_string(), id);
        }
        return Ok(Value::Object(out));
    }

    for (key, _) in excludes {
        obj.remove(key.as_str());
    }
    if !keep_id {
        obj.remove("_id");
    }
    Ok(Value::Object(obj))
}

/// Run a find over `docs`.
///
/// 1. Filter by selector.
/// 2. Sort.
/// 3. Skip then limit.
/// 4. Project, then transform.
pub fn execute_find<'a>(
    docs: impl IntoIterator<Item = &'a Value>,
    selector: &Value,
    options: &FindOptions,
) -> Result<Vec<Value>, QueryError> {
    shape_page(select_page(docs, selector, options)?, options)
}

/// Steps 1 to 3 of [`execute_find`]: the matching documents, sorted and
/// paged, cloned out of `docs`.
pub fn select_page<'a>(
    docs: impl IntoIterator<Item = &'a Value>,
    selector: &Value,
    options: &FindOptions,
) -> Result<Vec<Value>, QueryError> {
    let mut matched = Vec::new();
    for doc in docs {
        if matches(doc, selector)? {
            matched.push(doc.clone());
        }
    }

    if let Some(sort) = &options.sort {
        sort_documents(&mut matched, sort);
    }

    let iter = matched.into_iter().skip(options.skip.unwrap_or(0));
    Ok(match options.limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    })
}

/// Step 4 of [`execute_find`]. Runs user code, so callers holding a lock on
/// the source documents should release it first.
pub fn shape_page(page: Vec<Value>, options: &FindOptions) -> Result<Vec<Value>, QueryError> {
    page.into_iter()
        .map(|doc| {
            let doc = match &options.fields {
                Some(fields) => project(doc, fields)?,
                None => doc,
            };
            Ok(match &options.transform {
                Some(t) => t.apply(doc),
                None => doc,
            })
        })
        .collect()
}
