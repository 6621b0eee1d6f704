//! Kind entities as a schema source

use crate::store::EntityStore;
use mica_entity::kinds::{KIND_KIND, SCHEMA_FIELD};
use mica_validation::{SchemaSource, ValidationError};
use serde_json::Value;
use std::sync::Arc;

/// Resolves a kind to the `data.schema` of the Kind entity named after it
///
/// Only an entity whose `name` equals the kind exactly and whose own kind is
/// `/mica/kind/v1` counts. Anything else means "no schema".
#[derive(Debug, Clone)]
pub struct KindSchemas {
    store: Arc<EntityStore>,
}

impl KindSchemas {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }
}

impl SchemaSource for KindSchemas {
    fn schema_for_kind(&self, kind: &str) -> mica_validation::Result<Option<Value>> {
        let entity = self
            .store
            .get_by_name(kind)
            .map_err(|e| ValidationError::source(e.to_string()))?;
        Ok(entity
            .filter(|entity| entity.kind == KIND_KIND)
            .and_then(|mut entity| entity.data.remove(SCHEMA_FIELD)))
    }
}
