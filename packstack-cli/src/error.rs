//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use packstack::config::ConfigError;
use packstack::logging::LoggingError;
use packstack::reload::ReloadError;
use packstack::resource::ResourceError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid settings or arguments.
    Config(String),
    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// A pack directory does not exist.
    PackNotFound(PathBuf),
    /// No packs were configured.
    NoPacks,
    /// A resource lookup or read failed.
    Resource(ResourceError),
    /// The reload failed.
    Reload(ReloadError),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::PackNotFound(path) => {
                write!(f, "Pack directory not found: {}", path.display())
            }
            CliError::NoPacks => write!(
                f,
                "No packs configured. Pass --pack DIR or set [packs] dirs in config.ini"
            ),
            CliError::Resource(e) => write!(f, "{}", e),
            CliError::Reload(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Resource(e) => Some(e),
            CliError::Reload(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<ResourceError> for CliError {
    fn from(e: ResourceError) -> Self {
        CliError::Resource(e)
    }
}

impl From<ReloadError> for CliError {
    fn from(e: ReloadError) -> Self {
        CliError::Reload(e)
    }
}
