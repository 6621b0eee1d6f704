//! Render requests and responses

use crate::error::{RenderError, Result};
use mica_entity::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What to render and with which parameters
///
/// Exactly one of `entity_id`, `view_name` and `view` identifies the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_name: Option<String>,
    /// An unsaved view definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    /// Abort on the first failing item instead of skipping it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// Checked against the rendered document in addition to the view's own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// How the request names its view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewTarget {
    Id(EntityId),
    Name(String),
    Inline(Value),
}

impl RenderRequest {
    pub fn by_id(id: EntityId) -> Self {
        Self {
            entity_id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            view_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn inline(view: Value) -> Self {
        Self {
            view: Some(view),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// The single view identifier this request carries
    pub fn target(&self) -> Result<ViewTarget> {
        match (&self.entity_id, &self.view_name, &self.view) {
            (Some(id), None, None) => Ok(ViewTarget::Id(*id)),
            (None, Some(name), None) => Ok(ViewTarget::Name(name.clone())),
            (None, None, Some(view)) => Ok(ViewTarget::Inline(view.clone())),
            (None, None, None) => Err(RenderError::bad_request(
                "one of entityId, viewName or view is required",
            )),
            _ => Err(RenderError::bad_request(
                "only one of entityId, viewName or view may be given",
            )),
        }
    }
}

/// An item that was skipped during a non-strict render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Entity name, source URI or `script[i]` for rows produced by a script
    pub entity: String,
    pub stage: String,
    pub message: String,
}

impl ItemError {
    pub fn new(entity: impl Into<String>, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl From<ItemError> for RenderError {
    fn from(error: ItemError) -> Self {
        RenderError::ItemFailed {
            entity: error.entity,
            stage: error.stage,
            message: error.message,
        }
    }
}

/// The rendered document and how it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedView {
    /// An array of rows, or one object when the view merges
    pub document: Value,
    pub fetched_count: u64,
    pub rendered_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_errors: Vec<ItemError>,
    pub select_time_ms: u64,
    pub render_time_ms: u64,
}
