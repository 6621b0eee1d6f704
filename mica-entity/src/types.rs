//! Identifier and payload types

use crate::error::EntityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Ordered mapping from keys to arbitrary JSON values
///
/// `serde_json` is built with `preserve_order`, so key order is the insertion
/// order and renders are reproducible byte for byte.
pub type EntityData = serde_json::Map<String, serde_json::Value>;

/// Opaque, immutable entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Ulid);

impl EntityId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| EntityError::InvalidId {
                value: s.to_string(),
            })
    }
}

impl From<Ulid> for EntityId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}
