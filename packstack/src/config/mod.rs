//! Configuration.
//!
//! - [`ReloadConfig`]: behaviour of a
//!   [`ResourceDirectory`](crate::directory::ResourceDirectory)
//! - [`ConfigFile`]: the `config.ini` file read by the CLI

mod file;
mod reload;

pub use file::{ConfigError, ConfigFile, PacksSettings};
pub use reload::{ProfileMode, ReloadConfig, SwapTiming, DEFAULT_WORKERS};
