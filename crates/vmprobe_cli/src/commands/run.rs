//! Run command - Provision, verify and destroy one scenario.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use vmprobe_harness::{Credentials, Expectations, Invocation, Scenario};
use vmprobe_runner::{CliRunner, CliRunnerOptions};

use super::{load_scenario, Context, ScenarioFailed};

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file
    scenario: PathBuf,

    /// Override the settle delay in seconds
    #[arg(long, env = "VMPROBE_SETTLE_SECONDS")]
    settle: Option<u64>,

    /// Override the wall-clock budget in seconds
    #[arg(long, env = "VMPROBE_TIMEOUT_SECONDS")]
    timeout: Option<u64>,

    /// Leave the isolated workspace on disk
    #[arg(long)]
    keep_workspace: bool,

    /// Stream terraform output while it runs
    #[arg(long)]
    stream_logs: bool,
}

pub async fn execute(args: RunArgs, ctx: &Context) -> Result<()> {
    let credentials = Credentials::from_env()?;
    run_with(args, ctx, credentials).await
}

async fn run_with(args: RunArgs, ctx: &Context, credentials: Credentials) -> Result<()> {
    let (scenario, options) = prepare(&args, ctx)?;

    let invocation = Invocation::new(scenario, credentials);
    if !ctx.json {
        println!(
            "🚀 Running scenario {} (run {})",
            invocation.scenario().name,
            invocation.run_id()
        );
    }

    let report = invocation.run(Arc::new(CliRunner::new(options))).await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print!("{}", report.render());
    }

    if !report.passed() {
        return Err(ScenarioFailed::from_report(&report).into());
    }
    Ok(())
}

/// Load the scenario and apply command-line overrides.
fn prepare(args: &RunArgs, ctx: &Context) -> Result<(Scenario, CliRunnerOptions)> {
    let mut scenario = load_scenario(&args.scenario)?;
    if let Some(settle) = args.settle {
        scenario = scenario.with_settle(settle);
    }
    if let Some(timeout) = args.timeout {
        scenario = scenario.with_timeout(timeout);
    }
    scenario.keep_workspace |= args.keep_workspace;
    scenario.terraform.stream_logs |= args.stream_logs;

    let mut options = CliRunnerOptions::default();
    if ctx.dry_run {
        // Nothing is applied, so there are no outputs to check.
        info!("Dry run: output checks are skipped");
        options = options.dry_run();
        scenario = scenario
            .with_expectations(Expectations::none())
            .with_settle(0);
    }
    scenario.validate()?;
    Ok((scenario, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;
    use vmprobe_harness::FatalKind;

    use crate::{categorize_error, ExitCodes};

    fn args(scenario: PathBuf) -> RunArgs {
        RunArgs {
            scenario,
            settle: None,
            timeout: None,
            keep_workspace: false,
            stream_logs: false,
        }
    }

    fn credentials() -> Credentials {
        Credentials::new(
            "https://pve.example:8006/api2/json",
            "root@pam!test-token",
            "your-token-secret",
        )
        .unwrap()
    }

    /// Scenario file next to a one-file bundle, using `binary` as terraform.
    fn scenario_file(dir: &TempDir, binary: &str) -> PathBuf {
        let bundle = dir.path().join("micro_env");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("main.tf"), "output \"status\" { value = \"stopped\" }").unwrap();

        let path = dir.path().join("micro.yaml");
        fs::write(
            &path,
            format!(
                "terraform_dir: micro_env\nsettle_seconds: 5\nretry:\n  max_retries: 0\n\
                 terraform:\n  binary: {}\n",
                binary
            ),
        )
        .unwrap();
        path
    }

    #[cfg(unix)]
    fn fake_terraform(dir: &TempDir, status: &str, apply_exit: i32) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("terraform");
        let script = format!(
            r#"#!/bin/sh
case "$1" in
  apply)
    if [ {apply_exit} -ne 0 ]; then
      echo "Error: error creating VM: 596 Connection timed out" >&2
      exit {apply_exit}
    fi ;;
  output)
    case "$4" in
      vm_id) echo '"1000"' ;;
      name) echo '"test-vm"' ;;
      status) echo '"{status}"' ;;
    esac ;;
esac
exit 0
"#
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_overrides_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut run_args = args(scenario_file(&dir, "terraform"));
        run_args.settle = Some(0);
        run_args.timeout = Some(600);
        run_args.keep_workspace = true;

        let (scenario, options) = prepare(&run_args, &Context::default()).unwrap();

        assert_eq!(scenario.settle(), Duration::ZERO);
        assert_eq!(scenario.timeout(), Some(Duration::from_secs(600)));
        assert!(scenario.keep_workspace);
        assert_eq!(scenario.expect, Expectations::default());
        assert!(!options.dry_run);
    }

    #[test]
    fn test_dry_run_skips_output_checks() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            json: false,
            dry_run: true,
        };

        let (scenario, options) = prepare(&args(scenario_file(&dir, "terraform")), &ctx).unwrap();

        assert!(options.dry_run);
        assert_eq!(scenario.expect, Expectations::none());
        assert!(scenario.expect.checks().is_empty());
        assert_eq!(scenario.settle(), Duration::ZERO);
    }

    #[test]
    fn test_zero_timeout_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut run_args = args(scenario_file(&dir, "terraform"));
        run_args.timeout = Some(0);

        assert!(prepare(&run_args, &Context::default()).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passing_run() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_terraform(&dir, "stopped", 0);
        let mut run_args = args(scenario_file(&dir, &binary));
        run_args.settle = Some(0);

        run_with(run_args, &Context::default(), credentials())
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_assertion_failure_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_terraform(&dir, "running", 0);
        let mut run_args = args(scenario_file(&dir, &binary));
        run_args.settle = Some(0);

        let err = run_with(run_args, &Context::default(), credentials())
            .await
            .unwrap_err();

        let failed = err.downcast_ref::<ScenarioFailed>().unwrap();
        assert_eq!(failed.fatal, None);
        assert!(err.to_string().contains("1 assertion failure(s)"));
        assert_eq!(categorize_error(&err), ExitCodes::ASSERTION_FAILURE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_provisioning_failure_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_terraform(&dir, "stopped", 1);

        let err = run_with(
            args(scenario_file(&dir, &binary)),
            &Context::default(),
            credentials(),
        )
        .await
        .unwrap_err();

        let failed = err.downcast_ref::<ScenarioFailed>().unwrap();
        assert_eq!(failed.fatal, Some(FatalKind::Provisioning));
        assert!(err.to_string().contains("596"));
        assert_eq!(categorize_error(&err), ExitCodes::IAC_ERROR);
    }

    #[test]
    fn test_missing_scenario_file() {
        let result = prepare(&args(Path::new("/nonexistent/micro.yaml").into()), &Context::default());
        assert!(result.is_err());
    }
}
