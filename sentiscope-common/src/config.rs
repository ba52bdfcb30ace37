//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup; it is logged and
//! the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SENTISCOPE_ROOT";

/// Environment variable naming an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "SENTISCOPE_CONFIG";

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset (e.g. "info", "sentiscope_api=debug")
    pub level: Option<String>,
}

/// Contents of `config.toml`
///
/// Every field is optional so partial files are valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub frontend_url: Option<String>,

    pub huggingface_api_key: Option<String>,
    pub huggingface_model_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,

    pub jwt_secret: Option<String>,
    pub jwt_refresh_secret: Option<String>,
    pub jwt_expires_in_hours: Option<i64>,
    pub jwt_refresh_expires_in_days: Option<i64>,

    pub max_upload_mb: Option<u64>,
    pub classifier_interval_ms: Option<u64>,
    pub deep_group_delay_ms: Option<u64>,
    pub tesseract_binary: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Default location of the config file for the current platform
///
/// `~/.config/sentiscope/config.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sentiscope").join("config.toml"))
}

/// Load the TOML config file
///
/// The path comes from `explicit` (CLI), then `SENTISCOPE_CONFIG`, then the
/// platform default. Missing files yield defaults with a warning; a file that
/// exists but does not parse is a configuration error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
        .or_else(default_config_path);

    let Some(path) = path else {
        warn!("Could not determine config directory, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Resolve the root folder that holds the database, uploads and stored files
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sentiscope"))
        .unwrap_or_else(|| PathBuf::from("./sentiscope_data"))
}

/// Directory layout beneath the root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("sentiscope.db")
    }

    /// Short-lived upload temp files
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Persisted copies of analysed files
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join("storage")
    }

    /// Create the root folder and its subdirectories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.root.clone(), self.uploads_dir(), self.storage_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

/// First non-empty value among the candidates
///
/// Used to apply CLI → ENV → TOML priority to optional string settings.
pub fn first_non_empty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Read an environment variable, treating blank values as unset
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
