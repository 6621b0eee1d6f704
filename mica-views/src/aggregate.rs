//! Flatten and merge over shaped rows

use crate::request::ItemError;
use serde_json::{Map, Value};

pub(crate) const MERGE_STAGE: &str = "merge";

/// A shaped value and the record it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub origin: String,
    pub value: Value,
}

impl Row {
    pub fn new(origin: impl Into<String>, value: Value) -> Self {
        Self {
            origin: origin.into(),
            value,
        }
    }
}

/// Splice one level of array nesting into the row sequence
///
/// Non-array rows pass through unchanged; nested arrays deeper than one
/// level stay nested.
pub fn flatten(rows: Vec<Row>) -> Vec<Row> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row.value {
            Value::Array(items) => {
                out.extend(items.into_iter().map(|value| Row::new(row.origin.clone(), value)))
            }
            value => out.push(Row { value, ..row }),
        }
    }
    out
}

/// Shallow merge of object rows, later keys overwriting earlier ones
///
/// Rows that are not objects cannot be merged; each one is returned as an
/// item error and left out of the result.
pub fn merge(rows: Vec<Row>) -> (Map<String, Value>, Vec<ItemError>) {
    let mut merged = Map::new();
    let mut errors = Vec::new();
    for row in rows {
        match row.value {
            Value::Object(fields) => {
                for (key, value) in fields {
                    merged.insert(key, value);
                }
            }
            other => errors.push(ItemError::new(
                row.origin,
                MERGE_STAGE,
                format!(
                    "only objects can be merged, got {}",
                    mica_entity::json_type_name(&other)
                ),
            )),
        }
    }
    (merged, errors)
}
