//! packstack CLI - inspect layered pack stacks and drive live reloads.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;

use commands::common::KindArg;
use commands::config::ConfigCommands;
use commands::reload::ReloadArgs;
use error::CliError;
use runner::{CliRunner, GlobalArgs};

#[derive(Debug, Parser)]
#[command(name = "packstack")]
#[command(version = packstack::VERSION)]
#[command(about = "Inspect layered content pack stacks and drive live reloads", long_about = None)]
struct Cli {
    /// Path to config.ini (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pack directory, lowest priority first; repeat to stack packs
    #[arg(long = "pack", value_name = "DIR", global = true)]
    packs: Vec<PathBuf>,

    /// Which half of each pack to resolve
    #[arg(long, value_enum, global = true)]
    kind: Option<KindArg>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show which pack supplies a resource
    Resolve {
        /// Resource id, e.g. ui:textures/button.png
        id: String,

        /// Print the resource contents
        #[arg(long)]
        cat: bool,
    },

    /// Show every layer supplying a resource, lowest priority first
    Stack {
        /// Resource id, e.g. ui:textures/button.png
        id: String,
    },

    /// List resources under a directory
    List {
        /// Namespace-relative directory (no trailing slash); empty lists everything
        #[arg(default_value = "")]
        directory: String,

        /// Only list ids whose path ends with this suffix
        #[arg(long)]
        suffix: Option<String>,

        /// Show every layer of each resource
        #[arg(long)]
        stacks: bool,
    },

    /// List namespaces exposed by the pack stack
    Namespaces,

    /// List the pack stack in priority order
    Sources,

    /// Run a full reload with the built-in inventory listeners
    Reload(ReloadArgs),

    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let globals = GlobalArgs {
        config: cli.config,
        packs: cli.packs,
        kind: cli.kind,
        verbose: cli.verbose,
    };

    match cli.command {
        // Config commands work without a valid pack stack.
        Commands::Config { command } => commands::config::run(command, &globals),
        command => {
            let runner = CliRunner::new(globals)?;
            dispatch(&runner, command)
        }
    }
}

fn dispatch(runner: &CliRunner, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Resolve { id, cat } => commands::resolve::run_resolve(runner, &id, cat),
        Commands::Stack { id } => commands::resolve::run_stack(runner, &id),
        Commands::List {
            directory,
            suffix,
            stacks,
        } => commands::list::run_list(runner, &directory, suffix.as_deref(), stacks),
        Commands::Namespaces => commands::list::run_namespaces(runner),
        Commands::Sources => commands::list::run_sources(runner),
        Commands::Reload(args) => commands::reload::run(runner, args),
        Commands::Config { command } => commands::config::run(command, runner.globals()),
    }
}
