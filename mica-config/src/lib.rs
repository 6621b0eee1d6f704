//! Configuration for the Mica catalog
//!
//! [`ConfigProvider`] layers built-in defaults, discovered `mica.*` files,
//! explicitly added files and `MICA_` environment variables with
//! [figment](https://docs.rs/figment), then validates the result into a
//! [`CatalogConfig`].
//!
//! ```no_run
//! let config = mica_config::ConfigProvider::new()
//!     .with_file("/etc/mica/catalog.toml")
//!     .load()?;
//! assert!(config.scripts.workers >= 1);
//! # Ok::<(), mica_config::ConfigError>(())
//! ```

pub mod discovery;
pub mod error;
pub mod provider;
pub mod types;

pub use discovery::{ConfigFile, ConfigFormat, ConfigScope, FileDiscovery};
pub use error::ConfigError;
pub use provider::{load_config, ConfigProvider, ENV_PREFIX, ENV_SEPARATOR};
pub use types::{
    CatalogConfig, CatalogOptions, DatabaseConfig, FetchConfig, HistoryConfig, RenderConfig,
    DEFAULT_REMOTE_TIMEOUT_MS,
};

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
