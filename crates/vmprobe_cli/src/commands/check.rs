//! Check command - Validate a scenario without provisioning.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;
use tracing::info;

use vmprobe_harness::Credentials;
use vmprobe_iac::{validate_bundle, Terraform, TerraformOptions};
use vmprobe_runner::{CliRunner, CliRunnerOptions, ProcessRunner};

use super::{load_scenario, Context};

#[derive(Args)]
pub struct CheckArgs {
    /// Scenario file
    scenario: PathBuf,

    /// Skip the credentials check
    #[arg(long)]
    skip_credentials: bool,
}

pub async fn execute(args: CheckArgs, ctx: &Context) -> Result<()> {
    let scenario = load_scenario(&args.scenario)?;
    info!("Checking scenario {}", scenario.name);

    validate_bundle(&scenario.terraform_dir)?;

    let credentials = if args.skip_credentials {
        None
    } else {
        Some(Credentials::from_env()?)
    };

    let runner: Arc<dyn ProcessRunner> = Arc::new(CliRunner::new(CliRunnerOptions::default()));
    let binary = scenario.terraform_binary(runner.as_ref()).await?;
    let terraform = Terraform::new(
        runner,
        TerraformOptions::new(&scenario.terraform_dir).binary(binary),
    )?;
    terraform.ensure_available().await?;
    let program = terraform.program().to_string();

    if ctx.json {
        let summary = json!({
            "scenario": scenario.name,
            "terraform_dir": scenario.terraform_dir,
            "program": program,
            "checks": scenario.expect.checks().len(),
            "credentials": credentials.as_ref().map(|c| c.api_url.clone()),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("📋 Scenario {}", scenario.name);
    println!("   ✅ Scenario file is valid");
    println!(
        "   ✅ Bundle {} contains Terraform files",
        scenario.terraform_dir.display()
    );
    match &credentials {
        Some(c) => println!("   ✅ Credentials present for {}", c.api_url),
        None => println!("   ⚠️  Credentials not checked"),
    }
    println!("   ✅ {} is available", program);
    println!(
        "   ℹ️  {} output check(s), settle {}s",
        scenario.expect.checks().len(),
        scenario.settle_seconds
    );
    println!();
    println!("✅ Ready to run");
    Ok(())
}
