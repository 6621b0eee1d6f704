//! Configuration file discovery
//!
//! Looks for `mica.toml`, `mica.yaml`, `mica.yml` and `mica.json` in the
//! global directory (`~/.mica/`) and then in the project directory (the
//! working directory). Project files override global ones.

use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Name of the global configuration directory under the home directory
pub const GLOBAL_DIR_NAME: &str = ".mica";

const FILE_NAMES: &[&str] = &["mica.toml", "mica.yaml", "mica.yml", "mica.json"];

/// A discovered configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub format: ConfigFormat,
    pub scope: ConfigScope,
}

impl ConfigFile {
    pub fn new(path: PathBuf, format: ConfigFormat, scope: ConfigScope) -> Self {
        Self {
            path,
            format,
            scope,
        }
    }

    /// Classify an arbitrary path by its extension
    pub fn explicit(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let format = ConfigFormat::from_extension(path.extension()?.to_str()?)?;
        Some(Self::new(path, format, ConfigScope::Explicit))
    }
}

/// Configuration file format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where a configuration file came from, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigScope {
    Global,
    Project,
    Explicit,
}

/// Finds configuration files in the global and project directories
#[derive(Debug, Clone, Default)]
pub struct FileDiscovery {
    global_dir: Option<PathBuf>,
    project_dir: Option<PathBuf>,
}

impl FileDiscovery {
    /// Resolve `~/.mica/` and the working directory at discovery time
    pub fn new() -> Self {
        Self::default()
    }

    /// Search only the given directories
    pub fn with_dirs(global_dir: Option<PathBuf>, project_dir: Option<PathBuf>) -> Self {
        Self {
            global_dir,
            project_dir,
        }
    }

    /// All configuration files, lowest precedence first
    pub fn discover_all(&self) -> Vec<ConfigFile> {
        let global_dir = self
            .global_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(GLOBAL_DIR_NAME)));
        let project_dir = self
            .project_dir
            .clone()
            .or_else(|| std::env::current_dir().ok());

        let mut files = Vec::new();
        if let Some(dir) = &global_dir {
            files.extend(search_directory(dir, ConfigScope::Global));
        }
        if let Some(dir) = &project_dir {
            files.extend(search_directory(dir, ConfigScope::Project));
        }

        debug!("Discovered {} configuration files", files.len());
        files
    }
}

fn search_directory(dir: &Path, scope: ConfigScope) -> Vec<ConfigFile> {
    if !dir.exists() {
        trace!("Directory does not exist: {}", dir.display());
        return Vec::new();
    }
    if !dir.is_dir() {
        warn!("Path exists but is not a directory: {}", dir.display());
        return Vec::new();
    }

    FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .filter(|candidate| candidate.is_file())
        .filter_map(|candidate| {
            let format = ConfigFormat::from_extension(candidate.extension()?.to_str()?)?;
            trace!("Found config: {} ({:?})", candidate.display(), format);
            Some(ConfigFile::new(candidate, format, scope))
        })
        .collect()
}
