//! `list`, `namespaces` and `sources` commands.

use console::style;
use packstack::resolver::ResourceManager;
use packstack::resource::ResourceId;

use crate::error::CliError;
use crate::runner::CliRunner;

/// List resources under `directory`.
pub fn run_list(
    runner: &CliRunner,
    directory: &str,
    suffix: Option<&str>,
    stacks: bool,
) -> Result<(), CliError> {
    let resolver = runner.resolver()?;
    let filter = |id: &ResourceId| suffix.map_or(true, |suffix| id.path().ends_with(suffix));

    if stacks {
        let listed = resolver.list_resource_stacks(directory, &filter)?;
        for (id, layers) in &listed {
            let sources: Vec<&str> = layers.iter().map(|r| r.source_id()).collect();
            println!("{}  {}", id, style(sources.join(" < ")).dim());
        }
        println!();
        println!("{} resources", listed.len());
    } else {
        let listed = resolver.list_resources(directory, &filter)?;
        for (id, resource) in &listed {
            println!("{}  {}", id, style(resource.source_id()).dim());
        }
        println!();
        println!("{} resources", listed.len());
    }
    Ok(())
}

/// List namespaces exposed by the pack stack.
pub fn run_namespaces(runner: &CliRunner) -> Result<(), CliError> {
    let resolver = runner.resolver()?;
    for namespace in resolver.namespaces() {
        println!("{}", namespace);
    }
    Ok(())
}

/// List packs, highest priority first.
pub fn run_sources(runner: &CliRunner) -> Result<(), CliError> {
    let resolver = runner.resolver()?;
    let sources = resolver.list_sources();

    println!("Pack stack ({}), highest priority first", runner.kind());
    println!("─────────────────────────────────────");
    for (rank, source) in sources.iter().rev().enumerate() {
        let namespaces: Vec<String> = source.namespaces(runner.kind()).into_iter().collect();
        println!(
            "{:>3}. {:<24} {}",
            rank + 1,
            style(source.id()).bold(),
            style(namespaces.join(", ")).dim()
        );
    }
    Ok(())
}
