//! INI configuration file.
//!
//! ```ini
//! [reload]
//! workers = 4
//! profile = auto
//! swap = before_reload
//!
//! [packs]
//! kind = assets
//! dirs = /opt/packs/base, /opt/packs/addon
//! ```
//!
//! Pack directories are listed lowest priority first.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::reload::ReloadConfig;
use crate::source::PackKind;

const RELOAD_SECTION: &str = "reload";
const PACKS_SECTION: &str = "packs";

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse config file: {0}")]
    Parse(String),

    /// A key holds a value that cannot be used.
    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    /// No platform configuration directory exists.
    #[error("Could not determine the configuration directory")]
    NoConfigDir,
}

/// The pack stack to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacksSettings {
    /// Which half of each pack to resolve.
    pub kind: PackKind,
    /// Pack directories, lowest priority first.
    pub dirs: Vec<PathBuf>,
}

impl Default for PacksSettings {
    fn default() -> Self {
        Self {
            kind: PackKind::ClientResources,
            dirs: Vec::new(),
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub reload: ReloadConfig,
    pub packs: PacksSettings,
}

impl ConfigFile {
    /// Default location: `<config dir>/packstack/config.ini`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("packstack").join("config.ini"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini_str(&text)
    }

    /// Parse INI text.
    ///
    /// Missing sections and keys keep their defaults; unknown keys are
    /// ignored.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(RELOAD_SECTION)) {
            if let Some(value) = section.get("workers") {
                config.reload.workers = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                    invalid(RELOAD_SECTION, "workers", value, e.to_string())
                })?;
            }
            if let Some(value) = section.get("profile") {
                config.reload.profile = value
                    .parse()
                    .map_err(|reason| invalid(RELOAD_SECTION, "profile", value, reason))?;
            }
            if let Some(value) = section.get("swap") {
                config.reload.swap = value
                    .parse()
                    .map_err(|reason| invalid(RELOAD_SECTION, "swap", value, reason))?;
            }
        }

        if let Some(section) = ini.section(Some(PACKS_SECTION)) {
            if let Some(value) = section.get("kind") {
                config.packs.kind = value
                    .trim()
                    .parse()
                    .map_err(|reason| invalid(PACKS_SECTION, "kind", value, reason))?;
            }
            if let Some(value) = section.get("dirs") {
                config.packs.dirs = value
                    .split(',')
                    .map(str::trim)
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
        }

        Ok(config)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some(RELOAD_SECTION))
            .set("workers", self.reload.workers.to_string())
            .set("profile", self.reload.profile.to_string())
            .set("swap", self.reload.swap.to_string());

        let dirs: Vec<String> = self
            .packs
            .dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        ini.with_section(Some(PACKS_SECTION))
            .set("kind", self.packs.kind.directory())
            .set("dirs", dirs.join(", "));

        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(io_error)
    }
}

fn invalid(section: &'static str, key: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason,
    }
}
