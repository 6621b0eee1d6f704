//! Strict "no unexpected fields" schema rewriting
//!
//! Used by the catalog audit pass. Every object schema is closed unless it
//! already constrains extra properties itself. Drafts 2019-09 and 2020-12
//! close with `unevaluatedProperties: false`, which sees through `allOf`,
//! `anyOf` and `oneOf`. Older drafts only have `additionalProperties`, which
//! does not, so there a schema using composition is left open at that level.
//!
//! Composition branches are never closed at their own root (that would
//! reject the fields their siblings declare), but the objects nested inside
//! them are.

use jsonschema::Draft;
use serde_json::{Map, Value};

const UNEVALUATED: &str = "unevaluatedProperties";
const ADDITIONAL: &str = "additionalProperties";

/// Keywords whose value is a single subschema
const SINGLE_SUBSCHEMA: &[&str] = &["items", "additionalItems", "contains", ADDITIONAL];

/// Keywords whose value maps names to subschemas
const NAMED_SUBSCHEMAS: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
];

/// Keywords whose value is a list of subschemas
const COMPOSITION: &[&str] = &["allOf", "anyOf", "oneOf"];

/// The draft a schema declares through `$schema`, 2020-12 when it declares none
pub fn declared_draft(schema: &Value) -> Draft {
    let Some(uri) = schema.get("$schema").and_then(Value::as_str) else {
        return Draft::Draft202012;
    };
    if uri.contains("draft-04") {
        Draft::Draft4
    } else if uri.contains("draft-06") {
        Draft::Draft6
    } else if uri.contains("draft-07") {
        Draft::Draft7
    } else if uri.contains("2019-09") {
        Draft::Draft201909
    } else {
        Draft::Draft202012
    }
}

/// Return a copy of `schema` with every object closed the way `draft` allows
pub fn close_schema(schema: &Value, draft: Draft) -> Value {
    let closer = if matches!(draft, Draft::Draft4 | Draft::Draft6 | Draft::Draft7) {
        Closer::Additional
    } else {
        Closer::Unevaluated
    };
    let mut schema = schema.clone();
    closer.close(&mut schema);
    schema
}

/// Shorthand for [`close_schema`] under 2020-12
pub fn inject_unevaluated_properties(schema: &Value) -> Value {
    close_schema(schema, Draft::Draft202012)
}

#[derive(Clone, Copy)]
enum Closer {
    Unevaluated,
    Additional,
}

impl Closer {
    fn close(self, schema: &mut Value) {
        let Value::Object(node) = schema else {
            return;
        };
        if self.should_close(node) {
            let keyword = match self {
                Self::Unevaluated => UNEVALUATED,
                Self::Additional => ADDITIONAL,
            };
            node.insert(keyword.to_string(), Value::Bool(false));
        }
        self.close_children(node);
    }

    fn should_close(self, node: &Map<String, Value>) -> bool {
        if node.contains_key(UNEVALUATED) || node.contains_key(ADDITIONAL) {
            return false;
        }
        match self {
            Self::Unevaluated => describes_object(node),
            Self::Additional => {
                describes_object(node) && !COMPOSITION.iter().any(|k| node.contains_key(*k))
            }
        }
    }

    fn close_children(self, node: &mut Map<String, Value>) {
        for keyword in SINGLE_SUBSCHEMA {
            match node.get_mut(*keyword) {
                Some(Value::Array(items)) => items.iter_mut().for_each(|s| self.close(s)),
                Some(sub) => self.close(sub),
                None => {}
            }
        }
        for keyword in NAMED_SUBSCHEMAS {
            if let Some(Value::Object(subs)) = node.get_mut(*keyword) {
                subs.values_mut().for_each(|s| self.close(s));
            }
        }
        if let Some(Value::Array(items)) = node.get_mut("prefixItems") {
            items.iter_mut().for_each(|s| self.close(s));
        }
        for keyword in COMPOSITION {
            if let Some(Value::Array(branches)) = node.get_mut(*keyword) {
                for branch in branches {
                    if let Value::Object(branch) = branch {
                        self.close_children(branch);
                    }
                }
            }
        }
    }
}

/// Whether a node describes an object, directly or through its branches
fn describes_object(node: &Map<String, Value>) -> bool {
    if node.contains_key("properties") {
        return true;
    }
    let typed = match node.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => false,
    };
    typed
        || COMPOSITION.iter().any(|keyword| match node.get(*keyword) {
            Some(Value::Array(branches)) => branches
                .iter()
                .any(|b| b.as_object().is_some_and(describes_object)),
            _ => false,
        })
}
