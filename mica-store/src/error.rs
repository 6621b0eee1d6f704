//! Error types for the entity store

use mica_common::{Classify, ErrorCode};
use mica_entity::{EntityError, EntityId};
use mica_validation::ValidationError;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in store and catalog operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live entity matches
    #[error("entity not found: {what}")]
    NotFound { what: String },

    /// Another entity already holds the name
    #[error("an entity named '{name}' already exists")]
    DuplicateName { name: String },

    /// The caller's `updatedAt` token is stale
    #[error("entity {id} was modified concurrently; re-fetch and retry with its current updatedAt")]
    Conflict { id: EntityId },

    /// Malformed request or document
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Data rejected by its kind schema
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage layer fault
    #[error("database error: {message}")]
    Database { message: String },

    /// A stored row could not be decoded
    #[error("corrupt row: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::database(error.to_string())
    }
}

impl Classify for StoreError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::DuplicateName { .. } | Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Entity(e) => e.code(),
            Self::Validation(e) => e.code(),
            Self::Database { .. } | Self::Corrupt { .. } => ErrorCode::InternalError,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(e) => e.details(),
            _ => None,
        }
    }
}
