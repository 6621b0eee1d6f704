//! Validated write path over the entity store
//!
//! Every write is checked before it reaches the store: the name must be
//! valid, the data must satisfy the schema of its kind (when one is
//! registered), and Kind entities must carry a schema that compiles.

use crate::error::{Result, StoreError};
use crate::schema::KindSchemas;
use crate::store::EntityStore;
use mica_entity::kinds::{KIND_KIND, SCHEMA_FIELD};
use mica_entity::{Entity, EntityError, EntityId, EntityWriteRequest, PartialEntity, WriteIntent};
use mica_validation::{
    LayeredSchemas, SchemaSource, StaticSchemas, ValidationError, ValidationMode, Validator,
};
use std::sync::Arc;
use tracing::debug;

/// Catalog operations that enforce kind schemas
#[derive(Clone)]
pub struct Catalog {
    store: Arc<EntityStore>,
    schemas: Arc<dyn SchemaSource>,
    require_registered_kinds: bool,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("require_registered_kinds", &self.require_registered_kinds)
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Built-in kinds first, then Kind entities in the store
    pub fn new(store: Arc<EntityStore>) -> Self {
        let schemas = LayeredSchemas::new()
            .layer(Arc::new(StaticSchemas::builtin()))
            .layer(Arc::new(KindSchemas::new(store.clone())));
        Self::with_schemas(store, Arc::new(schemas))
    }

    pub fn with_schemas(store: Arc<EntityStore>, schemas: Arc<dyn SchemaSource>) -> Self {
        Self {
            store,
            schemas,
            require_registered_kinds: false,
        }
    }

    /// Reject writes whose kind has no registered schema
    pub fn require_registered_kinds(mut self, required: bool) -> Self {
        self.require_registered_kinds = required;
        self
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn schemas(&self) -> Arc<dyn SchemaSource> {
        self.schemas.clone()
    }

    /// Create when the request has no id, compare-and-set update otherwise
    pub fn write(&self, request: EntityWriteRequest) -> Result<Entity> {
        match request.into_intent()? {
            WriteIntent::Create(entity) => {
                self.check(&entity)?;
                self.store.create(entity)
            }
            WriteIntent::Update {
                id,
                expected_updated_at,
                entity,
            } => {
                self.check(&entity)?;
                self.store.update(id, expected_updated_at, entity)
            }
        }
    }

    pub fn delete(&self, id: &EntityId) -> Result<()> {
        self.store.delete(id)
    }

    /// Validate an entity document without writing it
    pub fn check(&self, entity: &PartialEntity) -> Result<()> {
        entity.validate()?;

        match Validator::validate_kind(
            self.schemas.as_ref(),
            &entity.kind,
            &entity.data,
            ValidationMode::Standard,
        )? {
            Some(tree) => {
                tree.into_result(&entity.name)?;
            }
            None if self.require_registered_kinds => {
                return Err(ValidationError::UnknownKind {
                    kind: entity.kind.clone(),
                }
                .into());
            }
            None => {}
        }

        if entity.kind == KIND_KIND {
            let schema = entity.data.get(SCHEMA_FIELD).ok_or_else(|| {
                StoreError::from(EntityError::invalid_document(format!(
                    "kind '{}' has no '{}'",
                    entity.name, SCHEMA_FIELD
                )))
            })?;
            Validator::check_schema(schema)?;
        }

        debug!(name = %entity.name, kind = %entity.kind, "entity passed checks");
        Ok(())
    }
}
