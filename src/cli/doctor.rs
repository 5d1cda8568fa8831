//! Doctor command - check which analyzers are installed

use crate::models::ToolId;
use crate::probe::{Probe, ToolProber};
use anyhow::Result;
use console::style;

pub(super) fn run() -> Result<()> {
    println!("{}\n", style("Scanforge Doctor").bold());

    let results = ToolProber.probe_all(&ToolId::ALL);

    let mut available = 0;
    for tool in ToolId::ALL {
        let probe = &results[&tool];
        if probe.available {
            available += 1;
            println!(
                "{} {:<15} {:<38} [{}]",
                style("✓").green(),
                tool.to_string(),
                tool.description(),
                probe.detail
            );
        } else {
            println!(
                "{} {:<15} {:<38} [{}]",
                style("✗").red(),
                tool.to_string(),
                tool.description(),
                probe.detail
            );
        }
    }

    println!("\n{available}/{} tools available", ToolId::ALL.len());

    let missing: Vec<ToolId> = ToolId::ALL
        .into_iter()
        .filter(|t| !results[t].available)
        .collect();
    if !missing.is_empty() {
        println!("\nMissing tools:");
        for tool in missing {
            println!("  {:<15} {}", tool.to_string(), tool.install_hint());
        }
    }

    Ok(())
}
