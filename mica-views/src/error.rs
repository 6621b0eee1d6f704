//! Error types for view rendering

use mica_common::{Classify, ErrorCode};
use mica_fetch::FetchError;
use mica_js::JsError;
use mica_store::StoreError;
use mica_validation::{PropertyError, ValidationError};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for rendering
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that abort a render
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed render request
    #[error("bad render request: {message}")]
    BadRequest { message: String },

    /// The view, or a script it references, does not exist
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The view definition cannot be executed
    #[error("view '{view}' is invalid: {message}")]
    InvalidView { view: String, message: String },

    /// Supplied parameters violate their declared schemas
    #[error("invalid parameters: {}", .errors.keys().cloned().collect::<Vec<_>>().join(", "))]
    Parameters {
        errors: BTreeMap<String, PropertyError>,
    },

    /// A source failed and the caller asked for strict rendering
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// One item could not be shaped and the caller asked for strict rendering
    #[error("item '{entity}' failed at {stage}: {message}")]
    ItemFailed {
        entity: String,
        stage: String,
        message: String,
    },

    /// The transform script failed
    #[error(transparent)]
    Script(#[from] JsError),

    /// The rendered document violates the output schema
    #[error("rendered output failed validation: {}", .errors.keys().cloned().collect::<Vec<_>>().join(", "))]
    Output {
        errors: BTreeMap<String, PropertyError>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller went away
    #[error("render was cancelled")]
    Cancelled,
}

impl RenderError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid_view(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidView {
            view: view.into(),
            message: message.into(),
        }
    }
}

impl Classify for RenderError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest { .. }
            | Self::InvalidView { .. }
            | Self::Parameters { .. }
            | Self::ItemFailed { .. }
            | Self::Output { .. } => ErrorCode::BadRequest,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Fetch(e) => e.code(),
            Self::Script(e) => e.code(),
            Self::Validation(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Cancelled => ErrorCode::EvaluationError,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Parameters { errors } | Self::Output { errors } => {
                serde_json::to_value(errors).ok()
            }
            Self::Validation(e) => e.details(),
            Self::Store(e) => e.details(),
            _ => None,
        }
    }
}
