//! View definitions
//!
//! A view entity's `data` describes what to select and how to reshape it:
//!
//! ```yaml
//! selector:
//!   entityKind: /demo/v1
//!   source: file:///srv/catalog      # optional fetch URI
//!   limit: 100                       # optional
//! data:
//!   jsonPath: $.endpoints
//!   jsonPatch: [{op: add, path: /seen, value: true}]
//!   flatten: false
//!   merge: false
//!   script: {source: "input.filter(x => x.enabled)"}   # or {ref: /scripts/enabled}
//! parameters:
//!   env: {type: string, required: true}
//! outputSchema: {type: array}
//! ```

use crate::error::{RenderError, Result};
use crate::params::check_defaults;
use crate::shape::Shaper;
use indexmap::IndexMap;
use mica_entity::{Entity, EntityData, EntityId};
use mica_fetch::{parse_uri, FetchRequest};
use mica_validation::builtin::view_schema;
use mica_validation::{ValidationMode, Validator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name given to views rendered inline, without a stored entity
pub const INLINE_VIEW_NAME: &str = "<inline>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub selector: Selector,
    pub data: DataSpec,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    pub entity_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSpec {
    pub json_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_patch: Option<json_patch::Patch>,
    #[serde(default)]
    pub flatten: bool,
    #[serde(default)]
    pub merge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptSpec>,
}

/// Inline script source, or the name of a `/mica/script/v1` entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSpec {
    Source(String),
    Ref(String),
}

/// A view ready to render: the definition plus where it came from
#[derive(Debug, Clone)]
pub struct ResolvedView {
    /// Entity id, absent for inline views
    pub id: Option<EntityId>,
    pub name: String,
    pub definition: ViewDefinition,
}

impl ViewDefinition {
    /// Parse and check a view document
    ///
    /// Structural problems come back as a path → error report; a jsonPath
    /// that does not compile or a malformed source URI is `InvalidView`.
    pub fn parse(name: &str, data: &EntityData) -> Result<Self> {
        let document = Value::Object(data.clone());
        Validator::validate_value(&view_schema(), &document, ValidationMode::Standard)?
            .into_result(name)?;
        let definition: ViewDefinition = serde_json::from_value(document)
            .map_err(|e| RenderError::invalid_view(name, e.to_string()))?;
        definition.check(name)?;
        Ok(definition)
    }

    /// Compile-time checks beyond the document structure
    pub fn check(&self, name: &str) -> Result<()> {
        self.shaper(name)?;
        if let Some(source) = &self.selector.source {
            parse_uri(source).map_err(|e| RenderError::invalid_view(name, e.to_string()))?;
        }
        if let Some(schema) = &self.output_schema {
            Validator::check_schema(schema)?;
        }
        check_defaults(name, &self.parameters)?;
        Ok(())
    }

    pub fn shaper(&self, name: &str) -> Result<Shaper> {
        Shaper::new(&self.data.json_path, self.data.json_patch.clone())
            .map_err(|message| RenderError::invalid_view(name, message))
    }

    /// The fetch this view's selector describes
    pub fn fetch_request(&self, parameters: Map<String, Value>, strict: bool) -> Result<FetchRequest> {
        let mut request = FetchRequest::for_kind(&self.selector.entity_kind)
            .with_parameters(parameters)
            .strict(strict);
        if let Some(source) = &self.selector.source {
            request = request.with_uri(parse_uri(source)?);
        }
        if let Some(limit) = self.selector.limit {
            request = request.with_limit(limit);
        }
        Ok(request)
    }
}

impl ResolvedView {
    pub fn from_entity(entity: &Entity) -> Result<Self> {
        Ok(Self {
            id: Some(entity.id),
            name: entity.name.clone(),
            definition: ViewDefinition::parse(&entity.name, &entity.data)?,
        })
    }

    pub fn inline(document: Value) -> Result<Self> {
        let data = match document {
            Value::Object(data) => data,
            _ => return Err(RenderError::bad_request("inline view must be an object")),
        };
        Ok(Self {
            id: None,
            name: INLINE_VIEW_NAME.to_string(),
            definition: ViewDefinition::parse(INLINE_VIEW_NAME, &data)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> EntityData {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn test_parse_full_view() {
        let view = ViewDefinition::parse(
            "/views/full",
            &data(json!({
                "selector": {"entityKind": "/demo/v1", "source": "file:///tmp/x", "limit": 5},
                "data": {
                    "jsonPath": "$.value",
                    "jsonPatch": [{"op": "add", "path": "/seen", "value": true}],
                    "merge": true,
                    "script": {"ref": "/scripts/tidy"}
                },
                "parameters": {"env": {"type": "string"}},
                "outputSchema": {"type": "object"}
            })),
        )
        .unwrap();
        assert_eq!(view.selector.limit, Some(5));
        assert!(view.data.merge);
        assert!(!view.data.flatten);
        assert_eq!(view.data.script, Some(ScriptSpec::Ref("/scripts/tidy".into())));
        assert_eq!(view.parameters.len(), 1);

        let request = view.fetch_request(Map::new(), true).unwrap();
        assert_eq!(request.kind.as_deref(), Some("/demo/v1"));
        assert_eq!(request.scheme(), Some("file"));
        assert_eq!(request.limit, Some(5));
        assert!(request.strict);
    }

    #[test]
    fn test_structural_errors_are_reported_by_path() {
        let err = ViewDefinition::parse("/views/bad", &data(json!({"selector": {}}))).unwrap_err();
        let errors = match err {
            RenderError::Validation(v) => v.errors().cloned().unwrap_or_default(),
            other => panic!("unexpected {other:?}"),
        };
        assert!(errors.contains_key("data"));
        assert!(errors.contains_key("selector.entityKind"));
    }

    #[test]
    fn test_bad_json_path_is_invalid_view() {
        let err = ViewDefinition::parse(
            "/views/bad-path",
            &data(json!({
                "selector": {"entityKind": "/demo/v1"},
                "data": {"jsonPath": "$[?(@.x"}
            })),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidView { .. }), "{err:?}");
    }

    #[test]
    fn test_invalid_parameter_default_is_invalid_view() {
        let err = ViewDefinition::parse(
            "/views/bad-default",
            &data(json!({
                "selector": {"entityKind": "/demo/v1"},
                "data": {"jsonPath": "$"},
                "parameters": {"limit": {"type": "integer", "default": "ten"}}
            })),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidView { .. }), "{err:?}");
    }

    #[test]
    fn test_inline_view_must_be_object() {
        assert!(matches!(
            ResolvedView::inline(json!([1])),
            Err(RenderError::BadRequest { .. })
        ));
        let view = ResolvedView::inline(json!({
            "selector": {"entityKind": "/demo/v1"},
            "data": {"jsonPath": "$"}
        }))
        .unwrap();
        assert!(view.id.is_none());
        assert_eq!(view.name, INLINE_VIEW_NAME);
    }
}
