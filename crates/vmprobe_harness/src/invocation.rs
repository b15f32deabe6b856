//! The provisioning test runner.
//!
//! An [`Invocation`] binds a scenario to credentials and runs it once:
//! isolate the bundle, write the var file, `init` + `apply`, read and
//! check outputs, and always `destroy`.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use vmprobe_iac::{Terraform, TerraformOptions, Workspace};
use vmprobe_runner::ProcessRunner;

use crate::credentials::Credentials;
use crate::error::{HarnessError, HarnessResult};
use crate::expect::OutputCheck;
use crate::lifecycle::{provisioned_scope, BodyOutcome, Lifecycle};
use crate::report::{CheckResult, FatalError, TestReport};
use crate::scenario::Scenario;

/// One run of a scenario.
pub struct Invocation {
    scenario: Scenario,
    credentials: Credentials,
    run_id: String,
}

impl Invocation {
    pub fn new(scenario: Scenario, credentials: Credentials) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        Self {
            scenario,
            credentials,
            run_id,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run the scenario to completion.
    ///
    /// Errors before provisioning starts (invalid bundle, unwritable var
    /// file, no container runtime) are returned directly; everything after
    /// that is captured in the report.
    pub async fn run(&self, runner: Arc<dyn ProcessRunner>) -> HarnessResult<TestReport> {
        let started_at = Utc::now();
        info!(run_id = %self.run_id, "Starting scenario {}", self.scenario.name);

        self.scenario.validate()?;
        let mut workspace = Workspace::isolate(&self.scenario.terraform_dir)?;
        if self.scenario.keep_workspace {
            workspace.keep();
        }
        let var_file = workspace.write_var_file(&self.scenario.vars.to_vars()?)?;

        let binary = self.scenario.terraform_binary(runner.as_ref()).await?;
        let options = self.credentials.apply_to(
            TerraformOptions::new(workspace.path())
                .var_file(var_file)
                .retry(self.scenario.retry.clone())
                .binary(binary)
                .command_timeout(self.scenario.terraform.command_timeout_seconds)
                .stream_logs(self.scenario.terraform.stream_logs),
        );
        let terraform = Arc::new(Terraform::new(runner, options)?);

        let lifecycle = Lifecycle::new();
        let checks: Arc<Mutex<Vec<CheckResult>>> = Arc::new(Mutex::new(Vec::new()));
        let plan = self.scenario.expect.checks();
        let settle = self.scenario.settle();

        let outcome = provisioned_scope(terraform, &lifecycle, self.scenario.timeout(), {
            let checks = checks.clone();
            move |terraform| async move {
                let (before, after): (Vec<OutputCheck>, Vec<OutputCheck>) =
                    plan.into_iter().partition(|c| !c.after_settle);

                verify(&terraform, &before, &checks).await?;
                if !settle.is_zero() && !after.is_empty() {
                    info!("Waiting {:?} for the VM to settle", settle);
                    tokio::time::sleep(settle).await;
                }
                verify(&terraform, &after, &checks).await?;

                let passed = checks.lock().iter().all(|c| c.passed);
                Ok::<_, HarnessError>(if passed {
                    BodyOutcome::passed(())
                } else {
                    BodyOutcome::failed(())
                })
            }
        })
        .await;

        let fatal = outcome.result.as_ref().err().map(|e| {
            error!(run_id = %self.run_id, "{}", e);
            FatalError::from(e)
        });

        let report = TestReport {
            scenario: self.scenario.name.clone(),
            run_id: self.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            phases: lifecycle.history(),
            checks: checks.lock().clone(),
            fatal,
            teardown: outcome.teardown,
            require_clean_teardown: self.scenario.require_clean_teardown,
        };

        if report.passed() {
            info!(run_id = %self.run_id, "Scenario {} passed", self.scenario.name);
        } else {
            warn!(
                run_id = %self.run_id,
                "Scenario {} failed with {} assertion failure(s)",
                self.scenario.name,
                report.failures().len()
            );
        }
        Ok(report)
    }
}

/// Read each output and record the check; a failed read aborts.
async fn verify(
    terraform: &Terraform,
    checks: &[OutputCheck],
    sink: &Mutex<Vec<CheckResult>>,
) -> HarnessResult<()> {
    for check in checks {
        let actual = terraform
            .output(&check.output)
            .await
            .map_err(HarnessError::from_iac)?;
        let result = CheckResult::evaluate(check, &actual);
        if let Some(failure) = result.failure() {
            warn!("{}", failure);
        }
        sink.lock().push(result);
    }
    Ok(())
}
