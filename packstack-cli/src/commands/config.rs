//! Configuration management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use packstack::config::ConfigFile;

use crate::error::CliError;
use crate::runner::GlobalArgs;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, globals: &GlobalArgs) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", globals.config_path()?.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = globals.load_config()?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(globals, force),
    }
}

fn run_init(globals: &GlobalArgs, force: bool) -> Result<(), CliError> {
    let path = init_config(globals, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Write the default config, seeded from `--pack` and `--kind`.
fn init_config(globals: &GlobalArgs, force: bool) -> Result<PathBuf, CliError> {
    let path = globals.config_path()?;
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let mut config = ConfigFile::default();
    config.packs.dirs = globals.packs.clone();
    if let Some(kind) = globals.kind {
        config.packs.kind = kind.into();
    }
    config.save(&path)?;
    Ok(path)
}
