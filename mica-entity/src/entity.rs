//! Entity shapes

use crate::error::{EntityError, Result};
use crate::name::validate_name;
use crate::types::{EntityData, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read capability shared by everything a fetcher can produce
///
/// Stored entities, identity-less partial entities and ad-hoc projections
/// (such as render-history rows) all satisfy it.
pub trait EntityLike: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn data(&self) -> &EntityData;

    /// Copy the record into an owned [`PartialEntity`]
    fn to_partial(&self) -> PartialEntity {
        PartialEntity {
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            data: self.data().clone(),
        }
    }
}

/// A stored entity with identity and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency token; changes on every mutation
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub data: EntityData,
}

impl Entity {
    /// Look up a top-level data field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

impl EntityLike for Entity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn data(&self) -> &EntityData {
        &self.data
    }
}

/// An entity document without identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialEntity {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub data: EntityData,
}

impl PartialEntity {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            data: EntityData::new(),
        }
    }

    pub fn with_data(mut self, data: EntityData) -> Self {
        self.data = data;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Parse a `{name, kind, data}` document
    ///
    /// `data` may be omitted but must be an object when present.
    pub fn from_document(document: Value) -> Result<Self> {
        let Value::Object(mut map) = document else {
            return Err(EntityError::invalid_document("expected a JSON object"));
        };
        let name = take_string(&mut map, "name")?;
        let kind = take_string(&mut map, "kind")?;
        let data = match map.remove("data") {
            None | Some(Value::Null) => EntityData::new(),
            Some(Value::Object(data)) => data,
            Some(other) => {
                return Err(EntityError::invalid_document(format!(
                    "'data' must be an object, got {}",
                    json_type_name(&other)
                )))
            }
        };
        Ok(Self { name, kind, data })
    }

    /// Check the name against the naming rules
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.kind.trim().is_empty() {
            return Err(EntityError::invalid_document("'kind' must not be empty"));
        }
        Ok(())
    }
}

impl EntityLike for PartialEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn data(&self) -> &EntityData {
        &self.data
    }

    fn to_partial(&self) -> PartialEntity {
        self.clone()
    }
}

impl From<Entity> for PartialEntity {
    fn from(entity: Entity) -> Self {
        Self {
            name: entity.name,
            kind: entity.kind,
            data: entity.data,
        }
    }
}

/// Create or update payload: `{ id?, updatedAt?, name, kind, data }`
///
/// A request without `id` creates; a request with `id` must also carry the
/// `updatedAt` the client last observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityWriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub data: EntityData,
}

/// What a write request asks the store to do
#[derive(Debug, Clone, PartialEq)]
pub enum WriteIntent {
    Create(PartialEntity),
    Update {
        id: EntityId,
        expected_updated_at: DateTime<Utc>,
        entity: PartialEntity,
    },
}

impl EntityWriteRequest {
    pub fn create(entity: PartialEntity) -> Self {
        Self {
            id: None,
            updated_at: None,
            name: entity.name,
            kind: entity.kind,
            data: entity.data,
        }
    }

    pub fn update(id: EntityId, expected_updated_at: DateTime<Utc>, entity: PartialEntity) -> Self {
        Self {
            id: Some(id),
            updated_at: Some(expected_updated_at),
            name: entity.name,
            kind: entity.kind,
            data: entity.data,
        }
    }

    /// Decide between create and update
    pub fn into_intent(self) -> Result<WriteIntent> {
        let entity = PartialEntity {
            name: self.name,
            kind: self.kind,
            data: self.data,
        };
        match (self.id, self.updated_at) {
            (None, None) => Ok(WriteIntent::Create(entity)),
            (None, Some(_)) => Err(EntityError::invalid_document(
                "'updatedAt' given without 'id'",
            )),
            (Some(_), None) => Err(EntityError::invalid_document(
                "updates must carry the last observed 'updatedAt'",
            )),
            (Some(id), Some(expected_updated_at)) => Ok(WriteIntent::Update {
                id,
                expected_updated_at,
                entity,
            }),
        }
    }
}

fn take_string(map: &mut serde_json::Map<String, Value>, key: &str) -> Result<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(EntityError::invalid_document(format!(
            "'{}' must be a string, got {}",
            key,
            json_type_name(&other)
        ))),
        None => Err(EntityError::invalid_document(format!(
            "missing required field '{}'",
            key
        ))),
    }
}

/// JSON type name used in error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
