//! `resolve` and `stack` commands.

use console::style;
use packstack::resolver::ResourceManager;
use packstack::resource::Resource;

use super::common::{format_bytes, parse_id};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Show which pack supplies `id`.
pub fn run_resolve(runner: &CliRunner, id: &str, cat: bool) -> Result<(), CliError> {
    let id = parse_id(id)?;
    let resolver = runner.resolver()?;

    let Some(resource) = resolver.resource(&id) else {
        println!("{} {} (not found or blocked)", style("✗").red(), id);
        return Ok(());
    };

    if cat {
        let text = resource.read_to_string()?;
        print!("{}", text);
        return Ok(());
    }

    println!("{} {}", style("✓").green(), style(&id).bold());
    print_layer(&resource)?;
    Ok(())
}

/// Show every layer supplying `id`.
pub fn run_stack(runner: &CliRunner, id: &str) -> Result<(), CliError> {
    let id = parse_id(id)?;
    let resolver = runner.resolver()?;
    let stack = resolver.resource_stack(&id);

    if stack.is_empty() {
        println!("{} {} (not found or blocked)", style("✗").red(), id);
        return Ok(());
    }

    println!("{} ({} layers, lowest priority first)", style(&id).bold(), stack.len());
    for (index, resource) in stack.iter().enumerate() {
        let marker = if index + 1 == stack.len() {
            style("▶").green()
        } else {
            style(" ").dim()
        };
        print!("{} ", marker);
        print_layer(resource)?;
    }
    Ok(())
}

fn print_layer(resource: &Resource) -> Result<(), CliError> {
    let size = resource.read_to_vec()?.len() as u64;
    let metadata = resource.metadata()?;
    let sections: Vec<&str> = metadata.section_names().collect();

    print!("{:<24} {:>10}", resource.source_id(), format_bytes(size));
    if sections.is_empty() {
        println!();
    } else {
        println!("  meta: {}", style(sections.join(", ")).cyan());
    }
    Ok(())
}
