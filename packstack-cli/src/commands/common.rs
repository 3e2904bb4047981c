//! Common types and helpers shared across CLI commands.

use clap::ValueEnum;
use packstack::resource::ResourceId;
use packstack::source::PackKind;

use crate::error::CliError;

/// Pack kind selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum KindArg {
    /// Client resources under assets/
    Assets,
    /// Server data under data/
    Data,
}

impl From<KindArg> for PackKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Assets => PackKind::ClientResources,
            KindArg::Data => PackKind::ServerData,
        }
    }
}

/// Parse a resource id argument.
pub fn parse_id(text: &str) -> Result<ResourceId, CliError> {
    Ok(ResourceId::parse(text)?)
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let value = bytes as f64;

    if value >= MIB {
        format!("{:.1} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{} B", bytes)
    }
}
