//! Catalog configuration sections

use crate::error::ConfigError;
use crate::ConfigResult;
use mica_entity::history::DEFAULT_RETENTION_DAYS;
use mica_entity::HistoryRetention;
use mica_js::ScriptLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for requests to remote catalogs, in milliseconds
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 30_000;

/// Everything needed to assemble a catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database: DatabaseConfig,
    pub scripts: ScriptLimits,
    pub history: HistoryConfig,
    pub render: RenderConfig,
    pub fetch: FetchConfig,
    pub catalog: CatalogOptions,
}

/// Where entities live
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; absent means an in-memory catalog
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Render-history rows older than this are eligible for purging
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl HistoryConfig {
    pub fn retention(&self) -> HistoryRetention {
        HistoryRetention::days(self.retention_days)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Abort renders on the first failing item unless the request says otherwise
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub remote_timeout_ms: u64,
    /// Bearer tokens for remote catalogs, looked up by `secretRef`
    pub secrets: HashMap<String, String>,
    /// Row cap for views that set no `selector.limit`
    pub default_limit: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            secrets: HashMap::new(),
            default_limit: None,
        }
    }
}

impl FetchConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// Reject writes whose kind has no registered schema
    pub require_registered_kinds: bool,
}

impl CatalogConfig {
    /// Reject values that parse but cannot work
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scripts.timeout.is_zero() {
            return Err(ConfigError::invalid_value("scripts.timeout", "must be greater than zero"));
        }
        if self.scripts.workers == 0 {
            return Err(ConfigError::invalid_value("scripts.workers", "must be at least 1"));
        }
        if self.scripts.step_budget == 0 {
            return Err(ConfigError::invalid_value("scripts.step_budget", "must be greater than zero"));
        }
        if self.history.retention_days == 0 {
            return Err(ConfigError::invalid_value(
                "history.retention_days",
                "must be at least 1",
            ));
        }
        if self.fetch.remote_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "fetch.remote_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.fetch.default_limit == Some(0) {
            return Err(ConfigError::invalid_value("fetch.default_limit", "must be at least 1"));
        }
        Ok(())
    }
}
