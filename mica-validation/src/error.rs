//! Error types for schema validation

use crate::property::PropertyError;
use mica_common::{Classify, ErrorCode};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors that can occur while validating documents
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The schema itself does not compile
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    /// The document violates its schema; `errors` maps dotted paths to violations
    #[error("{subject} failed validation: {}", summarize(.errors))]
    Failed {
        subject: String,
        errors: BTreeMap<String, PropertyError>,
    },

    /// A schema was required but the kind has none registered
    #[error("no schema registered for kind '{kind}'")]
    UnknownKind { kind: String },

    /// The schema source could not be read
    #[error("schema source error: {message}")]
    Source { message: String },
}

impl ValidationError {
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// The `path -> error` report, empty unless this is a `Failed` error
    pub fn errors(&self) -> Option<&BTreeMap<String, PropertyError>> {
        match self {
            Self::Failed { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

impl Classify for ValidationError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSchema { .. } | Self::Failed { .. } => ErrorCode::BadRequest,
            Self::UnknownKind { .. } => ErrorCode::UnknownEntityKind,
            Self::Source { .. } => ErrorCode::InternalError,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        self.errors().and_then(|errors| serde_json::to_value(errors).ok())
    }
}

fn summarize(errors: &BTreeMap<String, PropertyError>) -> String {
    errors
        .iter()
        .map(|(path, error)| format!("{}: {}", path, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}
