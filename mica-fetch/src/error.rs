//! Error types for entity fetching

use mica_common::{Classify, ErrorCode};
use thiserror::Error;

/// Result type for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Failures normalized from every fetcher's own error taxonomy
///
/// Each variant is either a caller error (the request or URI is wrong) or a
/// transient infrastructure error (the source could not be reached).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Malformed request, URI, or source document
    #[error("bad fetch request: {message}")]
    BadRequest { message: String },

    /// No registered fetcher claims the URI scheme
    #[error("no fetcher supports URI scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    /// Two fetchers claim the same URI scheme
    #[error("URI scheme '{scheme}' is already claimed by fetcher '{owner}'")]
    DuplicateScheme { scheme: String, owner: String },

    /// The source could not be reached or read
    #[error("{source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },
}

impl FetchError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether the caller, not the source, is at fault
    pub fn is_caller_error(&self) -> bool {
        self.code().is_caller_error()
    }
}

impl Classify for FetchError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest { .. } | Self::UnsupportedScheme { .. } => ErrorCode::BadRequest,
            Self::DuplicateScheme { .. } => ErrorCode::InternalError,
            Self::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
        }
    }
}

impl From<mica_store::StoreError> for FetchError {
    fn from(error: mica_store::StoreError) -> Self {
        if error.code().is_caller_error() {
            Self::bad_request(error.to_string())
        } else {
            Self::unavailable("entity store", error.to_string())
        }
    }
}
