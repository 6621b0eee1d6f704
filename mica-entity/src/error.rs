//! Error types for the entity data model

use mica_common::{Classify, ErrorCode};
use thiserror::Error;

/// Result type for entity model operations
pub type Result<T> = std::result::Result<T, EntityError>;

/// Errors raised while building or parsing entity documents
#[derive(Debug, Error)]
pub enum EntityError {
    /// Name does not satisfy the naming rules
    #[error("invalid entity name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Identifier is not a valid ULID
    #[error("invalid entity id '{value}'")]
    InvalidId { value: String },

    /// Document is missing fields or has the wrong shape
    #[error("invalid entity document: {message}")]
    InvalidDocument { message: String },
}

impl EntityError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }
}

impl Classify for EntityError {
    fn code(&self) -> ErrorCode {
        ErrorCode::BadRequest
    }
}
