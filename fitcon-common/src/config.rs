//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `FITCON_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never an error: callers fall back to defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FITCON_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "fitcon.db";

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("fitcon"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\fitcon"))
        } else if cfg!(any(target_os = "linux", target_os = "macos")) {
            dirs::data_local_dir()
                .map(|d| d.join("fitcon"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/fitcon"))
        } else {
            PathBuf::from("./fitcon_data")
        };

        Self { root_folder }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[engine]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum observations a part number needs before it is reconciled
    pub min_observations: i64,
    /// Part numbers processed concurrently in batch runs
    pub workers: usize,
    /// Compare make/model/trim/engine case- and whitespace-insensitively
    pub normalize_signatures: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_observations: 2,
            workers: 4,
            normalize_signatures: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_observations < 1 {
            return Err(Error::Config(format!(
                "engine.min_observations must be at least 1, got {}",
                self.min_observations
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("engine.workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}

impl TomlConfig {
    /// Parse a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Load the first config file that exists
    ///
    /// Returns `Ok(None)` when no config file is present.
    pub fn load() -> Result<Option<(PathBuf, Self)>> {
        for candidate in config_file_candidates() {
            if candidate.exists() {
                let config = Self::load_from(&candidate)?;
                return Ok(Some((candidate, config)));
            }
        }
        Ok(None)
    }
}

/// Config file search order: user config dir, then system-wide
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("fitcon").join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/fitcon/config.toml"));
    }
    candidates
}

/// Resolves the root folder holding `fitcon.db`
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<&Path>) -> Self {
        self.cli_arg = cli_arg.map(Path::to_path_buf);
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        debug!(module = %self.module_name, "Root folder from compiled default");
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}
