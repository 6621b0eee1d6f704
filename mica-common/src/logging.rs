//! Logging helpers

use crate::error::{Classify, ErrorSeverity};
use serde::Serialize;
use std::fmt::{Debug, Display};

/// Wrapper for pretty-printing values in logs as indented JSON
///
/// ```ignore
/// use mica_common::Pretty;
/// tracing::debug!("rendered: {}", Pretty(&document));
/// ```
///
/// Falls back to `Debug` if the value cannot be serialized.
pub struct Pretty<T>(pub T);

impl<T: Serialize + Debug> Display for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string_pretty(&self.0) {
            Ok(json) => write!(f, "\n{}", json),
            Err(_) => write!(f, "\n{:#?}", self.0),
        }
    }
}

impl<T: Serialize + Debug> Debug for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Log an error at the level matching its classified severity
pub fn log_classified<E: Classify + Display>(context: &str, error: &E) {
    let code = error.code();
    match code.severity() {
        ErrorSeverity::Warning => tracing::warn!(code = %code, "{}: {}", context, error),
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            tracing::error!(code = %code, "{}: {}", context, error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pretty_renders_indented_json() {
        let rendered = Pretty(json!({"value": 1})).to_string();
        assert!(rendered.starts_with('\n'));
        assert!(rendered.contains("\"value\": 1"));
    }
}
