//! Schema validation producing [`ValidatedProperty`] trees

use crate::error::{Result, ValidationError};
use crate::property::{PropertyError, ValidatedProperty};
use crate::source::SchemaSource;
use crate::strict::{close_schema, declared_draft};
use jsonschema::error::ValidationErrorKind;
use mica_entity::EntityData;
use serde_json::Value;
use tracing::trace;

/// How strictly a document is checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Plain JSON Schema semantics
    #[default]
    Standard,
    /// Additionally reject fields the schema does not describe
    Strict,
}

/// Stateless JSON Schema validator
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Validate an entity data map
    pub fn validate(schema: &Value, data: &EntityData) -> Result<ValidatedProperty> {
        Self::validate_value(schema, &Value::Object(data.clone()), ValidationMode::Standard)
    }

    /// Validate a data map rejecting undeclared fields
    pub fn validate_strict(schema: &Value, data: &EntityData) -> Result<ValidatedProperty> {
        Self::validate_value(schema, &Value::Object(data.clone()), ValidationMode::Strict)
    }

    /// Validate any JSON value
    ///
    /// Only a schema that fails to compile is an `Err`; violations are
    /// reported inside the returned tree.
    pub fn validate_value(
        schema: &Value,
        instance: &Value,
        mode: ValidationMode,
    ) -> Result<ValidatedProperty> {
        let compiled = match mode {
            ValidationMode::Standard => jsonschema::validator_for(schema),
            ValidationMode::Strict => {
                let draft = declared_draft(schema);
                jsonschema::options()
                    .with_draft(draft)
                    .build(&close_schema(schema, draft))
            }
        }
        .map_err(|e| ValidationError::invalid_schema(e.to_string()))?;

        let mut tree = ValidatedProperty::from_value(instance);
        for error in compiled.iter_errors(instance) {
            let mut path = pointer_segments(&error.instance_path.to_string());
            let keyword = violated_keyword(&error.schema_path.to_string());
            let message = error.to_string();
            trace!(path = ?path, keyword = %keyword, "schema violation");

            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    if let Some(name) = property.as_str() {
                        path.push(name.to_string());
                    }
                }
                ValidationErrorKind::AdditionalProperties { unexpected }
                | ValidationErrorKind::UnevaluatedProperties { unexpected } => {
                    for name in unexpected {
                        let mut child = path.clone();
                        child.push(name.clone());
                        tree.attach_error(
                            &child,
                            PropertyError::new(
                                keyword.clone(),
                                format!("unexpected property '{}'", name),
                            ),
                        );
                    }
                    if !unexpected.is_empty() {
                        continue;
                    }
                }
                _ => {}
            }
            tree.attach_error(&path, PropertyError::new(keyword, message));
        }
        Ok(tree)
    }

    /// Check that a schema compiles
    pub fn check_schema(schema: &Value) -> Result<()> {
        jsonschema::validator_for(schema)
            .map(|_| ())
            .map_err(|e| ValidationError::invalid_schema(e.to_string()))
    }

    /// Validate data against the schema registered for `kind`
    ///
    /// Returns `None` when the kind has no schema; validation is skipped.
    pub fn validate_kind(
        source: &dyn SchemaSource,
        kind: &str,
        data: &EntityData,
        mode: ValidationMode,
    ) -> Result<Option<ValidatedProperty>> {
        match source.schema_for_kind(kind)? {
            Some(schema) => {
                Self::validate_value(&schema, &Value::Object(data.clone()), mode).map(Some)
            }
            None => {
                trace!(kind = %kind, "no schema registered, skipping validation");
                Ok(None)
            }
        }
    }
}

/// Split a JSON pointer into unescaped segments
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// The keyword at the end of a schema path (`/properties/name/type` → `type`)
fn violated_keyword(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && segment.parse::<usize>().is_err())
        .unwrap_or("invalid")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSchemas;
    use serde_json::json;

    fn data(value: Value) -> EntityData {
        match value {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        }
    }

    fn username_schema() -> Value {
        json!({
            "type": "object",
            "required": ["username"],
            "properties": {"username": {"type": "string"}}
        })
    }

    #[test]
    fn test_missing_required_field_reported_at_its_path() {
        let tree = Validator::validate(&username_schema(), &data(json!({}))).unwrap();
        let errors = tree.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["username"].kind, "required");
    }

    #[test]
    fn test_present_required_field_has_no_error() {
        let tree = Validator::validate(&username_schema(), &data(json!({"username": "bob"}))).unwrap();
        assert!(tree.is_valid());
        assert!(tree.errors().is_empty());
        assert_eq!(tree.child("username").unwrap().value, Some(json!("bob")));
    }

    #[test_log::test]
    fn test_nested_and_array_paths() {
        let schema = json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}}
                },
                "ports": {"type": "array", "items": {"type": "integer", "maximum": 65535}}
            }
        });
        let tree = Validator::validate(
            &schema,
            &data(json!({"address": {"city": 7}, "ports": [80, 70000]})),
        )
        .unwrap();

        let errors = tree.errors();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert_eq!(errors["address.city"].kind, "type");
        assert_eq!(errors["ports.1"].kind, "maximum");

        let city = tree.at(["address", "city"]).unwrap();
        assert!(city.value.is_none(), "invalid node never carries a value");
        assert_eq!(tree.at(["ports", "0"]).unwrap().value, Some(json!(80)));
    }

    #[test]
    fn test_additional_properties_reported_per_field() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {}},
            "additionalProperties": false
        });
        let tree = Validator::validate(&schema, &data(json!({"a": 1, "b": 2, "c": 3}))).unwrap();
        let errors = tree.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("b"));
        assert!(errors.contains_key("c"));
        assert!(tree.child("a").unwrap().is_valid());
    }

    #[test]
    fn test_strict_mode_rejects_undeclared_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "owner": {"type": "object", "properties": {"id": {"type": "string"}}}
            }
        });
        let doc = data(json!({"name": "x", "extra": true, "owner": {"id": "1", "nick": "y"}}));

        assert!(Validator::validate(&schema, &doc).unwrap().is_valid());

        let errors = Validator::validate_strict(&schema, &doc).unwrap().errors();
        assert!(errors.contains_key("extra"), "{errors:?}");
        assert!(errors.contains_key("owner.nick"), "{errors:?}");
        assert!(!errors.contains_key("name"));
    }

    #[test]
    fn test_strict_mode_sees_into_composed_schemas() {
        let schema = json!({
            "allOf": [
                {"type": "object", "properties": {"name": {"type": "string"}}},
                {"properties": {
                    "owner": {"type": "object", "properties": {"id": {"type": "string"}}}
                }}
            ]
        });
        let doc = data(json!({"name": "x", "owner": {"id": "1", "nick": "y"}, "extra": 1}));

        let errors = Validator::validate_strict(&schema, &doc).unwrap().errors();
        assert!(errors.contains_key("owner.nick"), "{errors:?}");
        assert!(errors.contains_key("extra"), "{errors:?}");
        assert!(!errors.contains_key("name"), "{errors:?}");
    }

    #[test]
    fn test_strict_mode_honours_declared_draft() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "definitions": {"unused": {"type": "object"}}
        });
        let doc = data(json!({"name": "x", "extra": true}));

        let errors = Validator::validate_strict(&schema, &doc).unwrap().errors();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors["extra"].kind, "additionalProperties");
    }

    #[test]
    fn test_root_type_violation() {
        let tree = Validator::validate_value(
            &json!({"type": "array"}),
            &json!({"a": 1}),
            ValidationMode::Standard,
        )
        .unwrap();
        assert!(tree.errors().contains_key("$"));
    }

    #[test]
    fn test_invalid_schema_is_an_error() {
        let err = Validator::check_schema(&json!({"type": 12})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSchema { .. }));
    }

    #[test]
    fn test_validate_kind_skips_unregistered_kind() {
        let source = StaticSchemas::new().with("/users/v1", username_schema());
        let skipped = Validator::validate_kind(
            &source,
            "/unregistered/v1",
            &data(json!({})),
            ValidationMode::Standard,
        )
        .unwrap();
        assert!(skipped.is_none());

        let checked =
            Validator::validate_kind(&source, "/users/v1", &data(json!({})), ValidationMode::Standard)
                .unwrap()
                .unwrap();
        assert!(!checked.is_valid());
    }

    #[test]
    fn test_pointer_helpers() {
        assert_eq!(pointer_segments(""), Vec::<String>::new());
        assert_eq!(pointer_segments("/a~1b/0/c~0d"), vec!["a/b", "0", "c~d"]);
        assert_eq!(violated_keyword("/properties/name/type"), "type");
        assert_eq!(violated_keyword("/items/0"), "items");
        assert_eq!(violated_keyword(""), "invalid");
    }
}
