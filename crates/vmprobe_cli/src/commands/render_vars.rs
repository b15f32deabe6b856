//! Render-vars command - Print the Terraform variable file for a scenario.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use vmprobe_harness::Scenario;

use super::{load_scenario, Context};

#[derive(Args)]
pub struct RenderVarsArgs {
    /// Scenario file
    scenario: PathBuf,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn execute(args: RenderVarsArgs, _ctx: &Context) -> Result<()> {
    let scenario = load_scenario(&args.scenario)?;
    let rendered = render(&scenario)?;

    match args.output {
        Some(path) => {
            fs::write(&path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote variables to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Credentials never appear here; they reach terraform through the environment.
fn render(scenario: &Scenario) -> Result<String> {
    let vars = scenario.vars.to_vars()?;
    Ok(serde_json::to_string_pretty(&vars)?)
}
