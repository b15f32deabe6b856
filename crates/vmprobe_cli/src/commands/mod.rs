//! CLI command definitions.
//!
//! Each subcommand operates on a single scenario file.

use std::path::Path;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use thiserror::Error;

use vmprobe_harness::{FatalKind, Scenario, TestReport};

pub mod check;
pub mod render_vars;
pub mod run;

/// vmprobe - provision, verify and destroy a VM through Terraform
#[derive(Parser)]
#[command(name = "vmprobe")]
#[command(version, about = "vmprobe - declarative infrastructure verification")]
#[command(long_about = r#"
vmprobe applies a Terraform configuration bundle that creates a Proxmox VM,
reads the bundle's outputs back, compares them with the scenario's
expectations, and always destroys what it created.

COMMANDS:
  run          → Provision, verify and destroy
  render-vars  → Print the variable file a run would write
  check        → Validate scenario, bundle and tooling without provisioning

CREDENTIALS:
  PROXMOX_API_URL, PROXMOX_API_TOKEN_ID, PROXMOX_API_TOKEN_SECRET

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or scenario
  3 - Assertion failure
  4 - Missing credentials
  5 - IaC error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs and reports as JSON
    #[arg(long, global = true, env = "VMPROBE_JSON")]
    pub json: bool,

    /// Log terraform commands without executing them
    #[arg(long, global = true, env = "VMPROBE_DRY_RUN")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the scenario's VM, verify its outputs, and destroy it
    Run(run::RunArgs),

    /// Print the Terraform variable file for a scenario
    #[command(name = "render-vars")]
    RenderVars(render_vars::RenderVarsArgs),

    /// Validate a scenario without provisioning anything
    Check(check::CheckArgs),
}

/// Global options shared by all commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub json: bool,
    pub dry_run: bool,
}

/// A run completed but did not pass.
#[derive(Error, Debug)]
#[error("Scenario {scenario} failed: {reason}")]
pub struct ScenarioFailed {
    pub scenario: String,
    pub reason: String,
    pub failures: usize,
    /// Error that ended validation early
    pub fatal: Option<FatalKind>,
    /// Teardown failed and the scenario requires a clean one
    pub teardown_failed: bool,
}

impl ScenarioFailed {
    pub fn from_report(report: &TestReport) -> Self {
        let failures = report.failures().len();
        let teardown_failed = report.require_clean_teardown && !report.teardown.is_clean();

        let reason = match &report.fatal {
            Some(fatal) => fatal.message.clone(),
            None if teardown_failed => "teardown did not complete".to_string(),
            None => format!("{} assertion failure(s)", failures),
        };

        Self {
            scenario: report.scenario.clone(),
            reason,
            failures,
            fatal: report.fatal.as_ref().map(|f| f.kind),
            teardown_failed,
        }
    }

    /// Outputs were read and compared, and only the comparison failed.
    pub fn is_assertion_failure(&self) -> bool {
        self.fatal.is_none() && !self.teardown_failed
    }
}

pub(crate) fn load_scenario(path: &Path) -> Result<Scenario> {
    Scenario::load(path).with_context(|| format!("Failed to load scenario {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clap::CommandFactory;
    use vmprobe_harness::{CheckResult, FatalError, Phase, TeardownOutcome};

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vmprobe",
            "run",
            "scenarios/micro.yaml",
            "--json",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.json);
        assert!(cli.dry_run);
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    fn report(checks: Vec<CheckResult>, teardown: TeardownOutcome) -> TestReport {
        TestReport {
            scenario: "micro-vm".to_string(),
            run_id: "r1".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            phases: vec![Phase::NotStarted, Phase::Provisioned, Phase::Destroyed],
            checks,
            fatal: None,
            teardown,
            require_clean_teardown: false,
        }
    }

    fn status_check(passed: bool) -> CheckResult {
        CheckResult {
            field: "status".to_string(),
            expected: "\"stopped\"".to_string(),
            actual: if passed { "stopped" } else { "running" }.to_string(),
            passed,
        }
    }

    #[test]
    fn test_failed_checks_are_assertion_failures() {
        let r = report(vec![status_check(false)], TeardownOutcome::Clean { attempts: 1 });
        let failed = ScenarioFailed::from_report(&r);

        assert!(failed.is_assertion_failure());
        assert_eq!(failed.failures, 1);
        assert_eq!(
            failed.to_string(),
            "Scenario micro-vm failed: 1 assertion failure(s)"
        );
    }

    #[test]
    fn test_fatal_error_is_not_an_assertion_failure() {
        let mut r = report(vec![], TeardownOutcome::Clean { attempts: 1 });
        r.fatal = Some(FatalError {
            kind: FatalKind::OutputRead,
            message: "Terraform output 'status' not found".to_string(),
        });
        let failed = ScenarioFailed::from_report(&r);

        assert!(!failed.is_assertion_failure());
        assert_eq!(failed.fatal, Some(FatalKind::OutputRead));
        assert!(failed.to_string().contains("output 'status' not found"));
        assert!(!failed.to_string().contains("0 assertion failure(s)"));
    }

    #[test]
    fn test_required_teardown_failure() {
        let mut r = report(
            vec![status_check(true)],
            TeardownOutcome::Failed {
                message: "destroy failed".to_string(),
            },
        );
        r.require_clean_teardown = true;
        let failed = ScenarioFailed::from_report(&r);

        assert!(failed.teardown_failed);
        assert!(!failed.is_assertion_failure());
        assert!(failed.to_string().contains("teardown did not complete"));
    }

    #[test]
    fn test_render_vars_parses() {
        let cli = Cli::try_parse_from(["vmprobe", "render-vars", "micro.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::RenderVars(_)));
    }
}
