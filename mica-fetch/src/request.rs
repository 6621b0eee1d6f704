//! Fetch requests

use crate::error::{FetchError, Result};
use serde_json::{Map, Value};
use url::Url;

/// What to pull, and from where
///
/// A request without a URI is a "fetch by kind" against the primary store.
/// A request with a URI is routed by its scheme.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    pub uri: Option<Url>,
    pub kind: Option<String>,
    pub limit: Option<usize>,
    /// Caller parameters, forwarded by fetchers that render remotely
    pub parameters: Map<String, Value>,
    /// Ask sources to fail fast instead of skipping bad records
    pub strict: bool,
}

impl FetchRequest {
    pub fn for_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn for_uri(uri: Url) -> Self {
        Self {
            uri: Some(uri),
            ..Self::default()
        }
    }

    pub fn with_uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn scheme(&self) -> Option<&str> {
        self.uri.as_ref().map(Url::scheme)
    }

    /// Whether an entity of `kind` passes the request's kind filter
    pub fn matches_kind(&self, kind: &str) -> bool {
        self.kind.as_deref().is_none_or(|wanted| wanted == kind)
    }

    /// Look up a query option on the URI
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.uri.as_ref().and_then(|uri| {
            uri.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        })
    }
}

/// Parse a fetch URI, treating malformed input as a caller error
pub fn parse_uri(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| FetchError::bad_request(format!("invalid URI '{}': {}", raw, e)))
}
