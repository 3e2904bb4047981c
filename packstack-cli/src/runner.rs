//! Shared setup for pack-stack commands.
//!
//! Loads the configuration file, applies command-line overrides, installs
//! logging and builds the pack stack.

use std::path::PathBuf;
use std::sync::Arc;

use packstack::config::{ConfigFile, PacksSettings};
use packstack::logging::{init_logging, LoggingConfig, LoggingGuard};
use packstack::resolver::AggregateResolver;
use packstack::source::{ContentSource, PackKind, PathSource};
use tracing::{debug, info, Level};

use crate::commands::common::KindArg;
use crate::error::CliError;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub packs: Vec<PathBuf>,
    pub kind: Option<KindArg>,
    pub verbose: u8,
}

impl GlobalArgs {
    /// The config file in use: `--config`, else the platform default.
    pub fn config_path(&self) -> Result<PathBuf, CliError> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(ConfigFile::default_path()?),
        }
    }

    /// Load the config file; only an explicit `--config` must exist.
    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        let path = self.config_path()?;
        let config = match &self.config {
            Some(_) => ConfigFile::load(&path)?,
            None => ConfigFile::load_or_default(&path)?,
        };
        Ok(config)
    }

    /// The loaded config with `--pack` and `--kind` applied.
    ///
    /// `--pack` directories replace `[packs] dirs`; `--kind` replaces
    /// `[packs] kind`.
    pub fn effective_config(&self) -> Result<ConfigFile, CliError> {
        let mut config = self.load_config()?;
        if !self.packs.is_empty() {
            config.packs.dirs = self.packs.clone();
        }
        if let Some(kind) = self.kind {
            config.packs.kind = kind.into();
        }
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Configuration plus logging for one CLI invocation.
pub struct CliRunner {
    globals: GlobalArgs,
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load configuration and install logging.
    pub fn new(globals: GlobalArgs) -> Result<Self, CliError> {
        let config = globals.effective_config()?;

        let logging = init_logging(
            &LoggingConfig::default()
                .with_level(globals.log_level())
                .with_ansi(console::colors_enabled_stderr()),
        )?;

        info!(
            version = packstack::VERSION,
            kind = %config.packs.kind,
            packs = config.packs.dirs.len(),
            "packstack starting"
        );

        Ok(Self {
            globals,
            config,
            _logging: logging,
        })
    }

    pub fn globals(&self) -> &GlobalArgs {
        &self.globals
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn kind(&self) -> PackKind {
        self.config.packs.kind
    }

    /// One [`PathSource`] per configured pack, lowest priority first.
    pub fn sources(&self) -> Result<Vec<Arc<dyn ContentSource>>, CliError> {
        pack_sources(&self.config.packs)
    }

    /// Resolver over the configured packs.
    pub fn resolver(&self) -> Result<AggregateResolver, CliError> {
        Ok(AggregateResolver::new(self.kind(), self.sources()?))
    }
}

/// Open every pack directory in `packs`, lowest priority first.
pub fn pack_sources(packs: &PacksSettings) -> Result<Vec<Arc<dyn ContentSource>>, CliError> {
    if packs.dirs.is_empty() {
        return Err(CliError::NoPacks);
    }

    packs
        .dirs
        .iter()
        .map(|dir| {
            if !dir.is_dir() {
                return Err(CliError::PackNotFound(dir.clone()));
            }
            debug!(pack = %dir.display(), "Adding pack");
            Ok(Arc::new(PathSource::new(dir)) as Arc<dyn ContentSource>)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use packstack::resolver::ResourceManager;
    use packstack::resource::ResourceId;
    use tempfile::TempDir;

    fn write(path: &std::path::Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn globals_with_config(temp: &TempDir) -> GlobalArgs {
        let config = temp.path().join("config.ini");
        let base = temp.path().join("base");
        std::fs::create_dir_all(&base).unwrap();
        write(
            &config,
            &format!("[packs]\nkind = data\ndirs = {}\n", base.display()),
        );
        GlobalArgs {
            config: Some(config),
            ..GlobalArgs::default()
        }
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let globals = GlobalArgs {
            config: Some(temp.path().join("missing.ini")),
            ..GlobalArgs::default()
        };
        assert!(matches!(globals.load_config(), Err(CliError::ConfigFile(_))));
    }

    #[test]
    fn test_config_file_settings_apply() {
        let temp = TempDir::new().unwrap();
        let config = globals_with_config(&temp).effective_config().unwrap();
        assert_eq!(config.packs.kind, PackKind::ServerData);
        assert_eq!(config.packs.dirs, vec![temp.path().join("base")]);
    }

    #[test]
    fn test_pack_flags_replace_config_dirs() {
        let temp = TempDir::new().unwrap();
        let overlay = temp.path().join("overlay");
        let globals = GlobalArgs {
            packs: vec![overlay.clone()],
            kind: Some(KindArg::Assets),
            ..globals_with_config(&temp)
        };

        let config = globals.effective_config().unwrap();
        assert_eq!(config.packs.dirs, vec![overlay]);
        assert_eq!(config.packs.kind, PackKind::ClientResources);
    }

    #[test]
    fn test_no_packs_configured() {
        let packs = PacksSettings::default();
        assert!(matches!(pack_sources(&packs), Err(CliError::NoPacks)));
    }

    #[test]
    fn test_missing_pack_directory() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone");
        let packs = PacksSettings {
            dirs: vec![missing.clone()],
            ..PacksSettings::default()
        };

        match pack_sources(&packs) {
            Err(CliError::PackNotFound(dir)) => assert_eq!(dir, missing),
            other => panic!("expected PackNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_later_pack_wins() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let overlay = temp.path().join("overlay");
        write(&base.join("assets/ui/lang/en.json"), "base");
        write(&overlay.join("assets/ui/lang/en.json"), "overlay");
        let packs = PacksSettings {
            dirs: vec![base, overlay],
            ..PacksSettings::default()
        };

        let sources = pack_sources(&packs).unwrap();
        assert_eq!(sources.len(), 2);
        let resolver = AggregateResolver::new(PackKind::ClientResources, sources);
        let id = ResourceId::parse("ui:lang/en.json").unwrap();
        assert_eq!(resolver.read_to_string(&id).unwrap(), "overlay");
    }
}
