//! Error classification shared across the Mica catalog
//!
//! Every crate defines a domain-specific `thiserror` enum. Those enums implement
//! [`Classify`] so callers (an HTTP layer, the CLI, tests) can map any failure
//! onto the same small taxonomy without knowing which crate produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity levels for error classification
///
/// - **Warning**: the operation completed but something was skipped.
/// - **Error**: the operation failed, the system is fine.
/// - **Critical**: storage or runtime failure that needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

/// The catalog-wide error taxonomy
///
/// The string form (see [`ErrorCode::as_str`]) is stable and is what
/// external interfaces report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed input, invalid URI, invalid name, parameter or schema violation
    BadRequest,
    /// Stale optimistic-concurrency token
    Conflict,
    /// Unknown kind, entity or view
    NotFound,
    /// Referenced kind has no registered schema where one is required
    UnknownEntityKind,
    /// Sandboxed script exceeded its wall-clock or step budget
    EvaluationTimeout,
    /// Sandboxed script raised, failed to parse, or returned a bad shape
    EvaluationError,
    /// Transient fetcher-level I/O failure
    SourceUnavailable,
    /// Unexpected storage or runtime fault
    InternalError,
}

impl ErrorCode {
    /// Stable machine-readable code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::UnknownEntityKind => "UNKNOWN_ENTITY_KIND",
            ErrorCode::EvaluationTimeout => "EVALUATION_TIMEOUT",
            ErrorCode::EvaluationError => "EVALUATION_ERROR",
            ErrorCode::SourceUnavailable => "SOURCE_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorCode::BadRequest
            | ErrorCode::Conflict
            | ErrorCode::NotFound
            | ErrorCode::UnknownEntityKind
            | ErrorCode::EvaluationError => ErrorSeverity::Warning,
            ErrorCode::EvaluationTimeout | ErrorCode::SourceUnavailable => ErrorSeverity::Error,
            ErrorCode::InternalError => ErrorSeverity::Critical,
        }
    }

    /// Whether the same request may succeed if simply retried later
    ///
    /// Conflicts are deliberately not transient: the caller has to re-read
    /// the entity and resubmit with the new token.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCode::SourceUnavailable)
    }

    /// Whether the failure was caused by the request rather than the system
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::BadRequest
                | ErrorCode::Conflict
                | ErrorCode::NotFound
                | ErrorCode::UnknownEntityKind
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a domain error onto the shared [`ErrorCode`] taxonomy
pub trait Classify {
    fn code(&self) -> ErrorCode;

    /// Structured details (for example a path → error validation report)
    fn details(&self) -> Option<serde_json::Value> {
        None
    }

    /// Build the caller-facing report for this error
    fn report(&self) -> ErrorReport
    where
        Self: fmt::Display,
    {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Serializable error summary returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
