//! Schema lookup by kind

use crate::builtin;
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Given a kind name, return its schema or nothing
///
/// Absence is not an error: callers treat "no schema" as "skip validation".
pub trait SchemaSource: Send + Sync {
    fn schema_for_kind(&self, kind: &str) -> Result<Option<Value>>;
}

impl<T: SchemaSource + ?Sized> SchemaSource for Arc<T> {
    fn schema_for_kind(&self, kind: &str) -> Result<Option<Value>> {
        (**self).schema_for_kind(kind)
    }
}

/// In-process schema set, used for the built-in kinds
#[derive(Debug, Clone, Default)]
pub struct StaticSchemas {
    schemas: HashMap<String, Value>,
}

impl StaticSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas for the catalog's own kinds (kind, view, script)
    pub fn builtin() -> Self {
        Self::new()
            .with(mica_entity::kinds::KIND_KIND, builtin::kind_schema())
            .with(mica_entity::kinds::VIEW_KIND, builtin::view_schema())
            .with(mica_entity::kinds::SCRIPT_KIND, builtin::script_schema())
    }

    pub fn with(mut self, kind: impl Into<String>, schema: Value) -> Self {
        self.schemas.insert(kind.into(), schema);
        self
    }
}

impl SchemaSource for StaticSchemas {
    fn schema_for_kind(&self, kind: &str) -> Result<Option<Value>> {
        Ok(self.schemas.get(kind).cloned())
    }
}

/// Several sources consulted in order; the first that knows the kind wins
#[derive(Clone, Default)]
pub struct LayeredSchemas {
    layers: Vec<Arc<dyn SchemaSource>>,
}

impl LayeredSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, source: Arc<dyn SchemaSource>) -> Self {
        self.layers.push(source);
        self
    }
}

impl SchemaSource for LayeredSchemas {
    fn schema_for_kind(&self, kind: &str) -> Result<Option<Value>> {
        for layer in &self.layers {
            if let Some(schema) = layer.schema_for_kind(kind)? {
                return Ok(Some(schema));
            }
        }
        Ok(None)
    }
}
