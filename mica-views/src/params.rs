//! Render parameters checked against a view's declared parameter schemas
//!
//! Each declared parameter is a schema node. Two keywords are read here
//! rather than by the schema validator: a boolean `required: true` makes the
//! parameter mandatory, and `default` fills it in when the caller omits it.

use crate::error::{RenderError, Result};
use indexmap::IndexMap;
use mica_validation::{PropertyError, ValidationMode, Validator, ROOT_PATH};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

const PREFIX: &str = "parameters";

/// Validate `supplied` against `declared`, returning the parameters to render with
///
/// Declared parameters are validated and defaulted. Parameters the view does
/// not declare pass through unchecked.
pub fn resolve_parameters(
    view: &str,
    declared: &IndexMap<String, Value>,
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut resolved = supplied.clone();
    let mut errors = BTreeMap::new();

    for (name, node) in declared {
        let (schema, required) = split_required(node);
        let value = match supplied.get(name) {
            Some(value) => value.clone(),
            None => match schema.get("default") {
                Some(default) => {
                    check_default(view, name, &schema, default)?;
                    resolved.insert(name.clone(), default.clone());
                    continue;
                }
                None if required => {
                    errors.insert(
                        key(name, ROOT_PATH),
                        PropertyError::new("required", format!("parameter '{}' is required", name)),
                    );
                    continue;
                }
                None => continue,
            },
        };

        let tree = Validator::validate_value(&schema, &value, ValidationMode::Standard).map_err(
            |e| RenderError::invalid_view(view, format!("parameter '{}': {}", name, e)),
        )?;
        for (path, error) in tree.errors() {
            errors.insert(key(name, &path), error);
        }
    }

    if errors.is_empty() {
        trace!(view = %view, parameters = resolved.len(), "parameters resolved");
        Ok(resolved)
    } else {
        Err(RenderError::Parameters { errors })
    }
}

/// Reject declared defaults that their own parameter schema does not accept
pub fn check_defaults(view: &str, declared: &IndexMap<String, Value>) -> Result<()> {
    for (name, node) in declared {
        let (schema, _) = split_required(node);
        if let Some(default) = schema.get("default") {
            check_default(view, name, &schema, default)?;
        }
    }
    Ok(())
}

fn check_default(view: &str, name: &str, schema: &Value, default: &Value) -> Result<()> {
    let tree = Validator::validate_value(schema, default, ValidationMode::Standard)
        .map_err(|e| RenderError::invalid_view(view, format!("parameter '{}': {}", name, e)))?;
    match tree.errors().into_iter().next() {
        None => Ok(()),
        Some((path, error)) => Err(RenderError::invalid_view(
            view,
            format!(
                "default of parameter '{}' is invalid at {}: {}",
                name, path, error.message
            ),
        )),
    }
}

/// Strip a boolean `required` so the remainder is a plain schema
fn split_required(node: &Value) -> (Value, bool) {
    match node {
        Value::Object(fields) => match fields.get("required") {
            Some(Value::Bool(required)) => {
                let mut schema = fields.clone();
                schema.remove("required");
                (Value::Object(schema), *required)
            }
            _ => (node.clone(), false),
        },
        other => (other.clone(), false),
    }
}

fn key(name: &str, path: &str) -> String {
    if path == ROOT_PATH {
        format!("{}.{}", PREFIX, name)
    } else {
        format!("{}.{}.{}", PREFIX, name, path)
    }
}
