//! The validated-property tree

use crate::error::ValidationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Path under which errors on the document root are reported
pub const ROOT_PATH: &str = "$";

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyError {
    /// Violated keyword, e.g. `required`, `type`, `pattern`
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl PropertyError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// One node of a validated document
///
/// Leaves that passed carry `value`. Object and array nodes carry
/// `properties` (arrays keyed by index). A node with `error` never carries
/// `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatedProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PropertyError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, ValidatedProperty>>,
}

impl ValidatedProperty {
    /// Build an all-valid tree mirroring `value`
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                value: None,
                error: None,
                properties: Some(
                    map.iter()
                        .map(|(key, child)| (key.clone(), Self::from_value(child)))
                        .collect(),
                ),
            },
            Value::Array(items) => Self {
                value: None,
                error: None,
                properties: Some(
                    items
                        .iter()
                        .enumerate()
                        .map(|(index, child)| (index.to_string(), Self::from_value(child)))
                        .collect(),
                ),
            },
            leaf => Self {
                value: Some(leaf.clone()),
                error: None,
                properties: None,
            },
        }
    }

    /// Recursive validity: no error here and none below
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
            && self
                .properties
                .as_ref()
                .is_none_or(|children| children.values().all(Self::is_valid))
    }

    pub fn child(&self, key: &str) -> Option<&ValidatedProperty> {
        self.properties.as_ref().and_then(|children| children.get(key))
    }

    /// Walk a path of keys from this node
    pub fn at<'a, I>(&self, path: I) -> Option<&ValidatedProperty>
    where
        I: IntoIterator<Item = &'a str>,
    {
        path.into_iter()
            .try_fold(self, |node, key| node.child(key))
    }

    /// Record a violation at `path`, creating intermediate nodes as needed
    ///
    /// Missing nodes are created for violations such as `required` that point
    /// at fields absent from the document. A second violation on the same
    /// node is folded into the first message.
    pub fn attach_error(&mut self, path: &[String], error: PropertyError) {
        let mut node = self;
        for key in path {
            node = node
                .properties
                .get_or_insert_with(IndexMap::new)
                .entry(key.clone())
                .or_default();
        }
        node.value = None;
        match node.error.as_mut() {
            Some(existing) if existing.message != error.message => {
                existing.message = format!("{}; {}", existing.message, error.message);
            }
            Some(_) => {}
            None => node.error = Some(error),
        }
    }

    /// Flatten into a `dotted path -> error` report
    ///
    /// Emits exactly one entry per node carrying an error; valid nodes never
    /// appear. Errors on the root are keyed by [`ROOT_PATH`].
    pub fn errors(&self) -> BTreeMap<String, PropertyError> {
        let mut out = BTreeMap::new();
        self.collect_errors(&mut Vec::new(), &mut out);
        out
    }

    fn collect_errors<'a>(
        &'a self,
        path: &mut Vec<&'a str>,
        out: &mut BTreeMap<String, PropertyError>,
    ) {
        if let Some(error) = &self.error {
            let key = if path.is_empty() {
                ROOT_PATH.to_string()
            } else {
                path.join(".")
            };
            out.insert(key, error.clone());
        }
        if let Some(children) = &self.properties {
            for (key, child) in children {
                path.push(key.as_str());
                child.collect_errors(path, out);
                path.pop();
            }
        }
    }

    /// Turn an invalid tree into a [`ValidationError::Failed`]
    pub fn into_result(self, subject: impl Into<String>) -> Result<Self, ValidationError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(ValidationError::Failed {
                subject: subject.into(),
                errors: self.errors(),
            })
        }
    }
}
