//! Configuration provider using Figment

use crate::discovery::{ConfigFile, ConfigFormat, FileDiscovery};
use crate::error::ConfigError;
use crate::types::CatalogConfig;
use crate::ConfigResult;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use std::path::PathBuf;
use tracing::{debug, info, trace};

/// Prefix of environment variables read into the configuration
pub const ENV_PREFIX: &str = "MICA_";

/// Separator between nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Loads [`CatalogConfig`] from every source in precedence order
///
/// 1. built-in defaults
/// 2. discovered files (`~/.mica/` then the working directory)
/// 3. files added with [`ConfigProvider::with_file`], in the order added
/// 4. `MICA_` environment variables (`MICA_RENDER__STRICT=true`)
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    discovery: FileDiscovery,
    files: Vec<PathBuf>,
    use_env: bool,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self {
            discovery: FileDiscovery::new(),
            files: Vec::new(),
            use_env: true,
        }
    }

    pub fn with_discovery(mut self, discovery: FileDiscovery) -> Self {
        self.discovery = discovery;
        self
    }

    /// Layer an explicit file over the discovered ones; it must exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn with_env(mut self, use_env: bool) -> Self {
        self.use_env = use_env;
        self
    }

    /// Build, extract and validate the configuration
    pub fn load(&self) -> ConfigResult<CatalogConfig> {
        let config: CatalogConfig = self.build_figment()?.extract()?;
        config.validate()?;
        info!(
            database = ?config.database.path,
            strict = config.render.strict,
            workers = config.scripts.workers,
            "Loaded catalog configuration"
        );
        Ok(config)
    }

    fn build_figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CatalogConfig::default()));

        for file in self.discovery.discover_all() {
            figment = figment.merge(file_provider(&file));
        }

        for path in &self.files {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound { path: path.clone() });
            }
            let file = ConfigFile::explicit(path.clone()).ok_or_else(|| {
                ConfigError::UnsupportedFormat {
                    format: path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .unwrap_or_default()
                        .to_string(),
                }
            })?;
            figment = figment.merge(file_provider(&file));
        }

        if self.use_env {
            debug!("Loading {}* environment variables", ENV_PREFIX);
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));
        }
        Ok(figment)
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn file_provider(file: &ConfigFile) -> Figment {
    trace!("Loading config file: {} ({:?})", file.path.display(), file.format);
    match file.format {
        ConfigFormat::Toml => Figment::from(Toml::file(&file.path)),
        ConfigFormat::Yaml => Figment::from(Yaml::file(&file.path)),
        ConfigFormat::Json => Figment::from(Json::file(&file.path)),
    }
}

/// Load with discovery from the default locations and the environment
pub fn load_config() -> ConfigResult<CatalogConfig> {
    ConfigProvider::new().load()
}
