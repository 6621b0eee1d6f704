//! Error types for sandboxed script evaluation

use mica_common::{Classify, ErrorCode};
use thiserror::Error;

/// Result type alias for script evaluation
pub type Result<T> = std::result::Result<T, JsError>;

/// Errors that can occur while evaluating a transform script
///
/// None of these take the host down; each is scoped to one evaluation.
#[derive(Debug, Error)]
pub enum JsError {
    /// The script threw, or failed to parse
    #[error("script error: {message}")]
    Script { message: String },

    /// The script ran past its wall-clock limit
    #[error("script exceeded its time limit of {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    /// The script ran past its step budget
    #[error("script exceeded its step budget of {budget} interrupt checks")]
    StepLimitExceeded { budget: u64 },

    /// The host cancelled the evaluation
    #[error("script evaluation was interrupted")]
    Interrupted,

    /// The script completed but did not produce a JSON array
    #[error("script output is invalid: {message}")]
    InvalidOutput { message: String },

    /// Value could not cross the sandbox boundary as JSON
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Runtime initialization or worker pool failure
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

impl JsError {
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script {
            message: msg.into(),
        }
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput {
            message: msg.into(),
        }
    }

    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: msg.into(),
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime {
            message: msg.into(),
        }
    }

    /// Whether the evaluation was stopped for running too long
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::StepLimitExceeded { .. })
    }
}

impl Classify for JsError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } | Self::StepLimitExceeded { .. } => ErrorCode::EvaluationTimeout,
            Self::Script { .. }
            | Self::Interrupted
            | Self::InvalidOutput { .. }
            | Self::TypeConversion { .. } => ErrorCode::EvaluationError,
            Self::Runtime { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for JsError {
    fn from(error: serde_json::Error) -> Self {
        Self::type_conversion(error.to_string())
    }
}
