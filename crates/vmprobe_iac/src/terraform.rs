//! Terraform lifecycle wrapper.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use vmprobe_runner::{CommandSpec, ExecutionResult, ProcessRunner, RunConfig};

use crate::error::{IacError, IacResult};
use crate::options::{TerraformBinary, TerraformOptions};
use crate::retry::CompiledRetryPolicy;

/// Result of a Terraform operation.
#[derive(Debug)]
pub struct TerraformResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i64,
    /// Number of attempts made, including retries
    pub attempts: u32,
}

impl TerraformResult {
    fn from_execution(result: &ExecutionResult, attempts: u32) -> Self {
        Self {
            success: result.success(),
            output: result.combined_output(),
            exit_code: result.exit_code,
            attempts,
        }
    }
}

/// Runs terraform commands for one set of options.
pub struct Terraform {
    runner: Arc<dyn ProcessRunner>,
    options: TerraformOptions,
    retry: CompiledRetryPolicy,
}

impl Terraform {
    /// Create a wrapper, compiling the retry policy up front.
    pub fn new(runner: Arc<dyn ProcessRunner>, options: TerraformOptions) -> IacResult<Self> {
        let retry = options.retry.compile()?;
        Ok(Self {
            runner,
            options,
            retry,
        })
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    /// The executable actually launched: terraform itself or the container runtime.
    pub fn program(&self) -> &str {
        match &self.options.binary {
            TerraformBinary::Host(path) => path,
            TerraformBinary::Container(config) => config.runtime.command(),
        }
    }

    /// Check that terraform can be executed.
    pub async fn ensure_available(&self) -> IacResult<()> {
        let program = self.program();
        if self.runner.is_available(program).await? {
            Ok(())
        } else {
            Err(IacError::TerraformNotAvailable(format!(
                "'{}' could not be executed",
                program
            )))
        }
    }

    /// Run terraform init. Safe to repeat on an initialized directory.
    pub async fn init(&self) -> IacResult<TerraformResult> {
        info!("Running terraform init in {:?}", self.options.terraform_dir);
        let result = self
            .run_with_retry("init", &["init", "-input=false", "-no-color"])
            .await?;
        if !result.success {
            return Err(IacError::InitFailed(result.output));
        }
        Ok(result)
    }

    /// Run terraform apply with auto-approve.
    pub async fn apply(&self) -> IacResult<TerraformResult> {
        info!("Running terraform apply in {:?}", self.options.terraform_dir);
        let mut args = vec!["apply", "-input=false", "-auto-approve", "-no-color"];
        let var_args = self.var_args();
        args.extend(var_args.iter().map(String::as_str));

        let result = self.run_with_retry("apply", &args).await?;
        if !result.success {
            return Err(IacError::ApplyFailed(result.output));
        }
        Ok(result)
    }

    /// Run init followed by apply.
    pub async fn init_and_apply(&self) -> IacResult<TerraformResult> {
        self.init().await?;
        self.apply().await
    }

    /// Run terraform destroy with auto-approve.
    pub async fn destroy(&self) -> IacResult<TerraformResult> {
        info!("Running terraform destroy in {:?}", self.options.terraform_dir);
        let mut args = vec!["destroy", "-input=false", "-auto-approve", "-no-color"];
        let var_args = self.var_args();
        args.extend(var_args.iter().map(String::as_str));

        let result = self.run_with_retry("destroy", &args).await?;
        if !result.success {
            return Err(IacError::DestroyFailed(result.output));
        }
        Ok(result)
    }

    /// Read a single output as JSON.
    pub async fn output_json(&self, name: &str) -> IacResult<Value> {
        debug!("Reading terraform output {}", name);
        let spec = self.command(&["output", "-no-color", "-json", name]);
        let result = self.execute(&spec).await?;

        if !result.success() {
            return Err(IacError::OutputMissing {
                name: name.to_string(),
                message: result.last_error_line().to_string(),
            });
        }

        let raw = result.stdout.trim();
        if raw.is_empty() {
            return Err(IacError::OutputParse {
                name: name.to_string(),
                message: "empty response".to_string(),
            });
        }
        serde_json::from_str(raw).map_err(|e| IacError::OutputParse {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Read a single output rendered as a string.
    ///
    /// Numbers and booleans are rendered in their literal form; lists and
    /// maps as compact JSON. A null output counts as missing.
    pub async fn output(&self, name: &str) -> IacResult<String> {
        match self.output_json(name).await? {
            Value::String(s) => Ok(s),
            Value::Null => Err(IacError::OutputMissing {
                name: name.to_string(),
                message: "output is null".to_string(),
            }),
            other => Ok(other.to_string()),
        }
    }

    /// `-var-file` and `-var` arguments for apply and destroy.
    fn var_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(file) = &self.options.var_file {
            args.push(format!("-var-file={}", file));
        } else {
            for (name, value) in &self.options.vars {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                args.push("-var".to_string());
                args.push(format!("{}={}", name, rendered));
            }
        }
        args
    }

    fn command(&self, args: &[&str]) -> CommandSpec {
        let mut spec = CommandSpec::new(match &self.options.binary {
            TerraformBinary::Host(path) => path.as_str(),
            TerraformBinary::Container(_) => "terraform",
        })
        .args(args.iter().copied())
        .workdir(&self.options.terraform_dir)
        .env("TF_IN_AUTOMATION", "1")
        .env("TF_INPUT", "0");

        for (key, value) in &self.options.env {
            spec = spec.env(key, value);
        }
        for (key, value) in &self.options.secret_env {
            spec = spec.secret_env(key, value);
        }
        spec
    }

    async fn execute(&self, spec: &CommandSpec) -> IacResult<ExecutionResult> {
        let run_config = RunConfig::default()
            .timeout(self.options.command_timeout_seconds)
            .stream_logs(self.options.stream_logs);

        let result = match &self.options.binary {
            TerraformBinary::Host(_) => self.runner.run(spec, &run_config).await?,
            TerraformBinary::Container(config) => {
                let wrapped = config.wrap(spec)?;
                self.runner.run(&wrapped, &run_config).await?
            }
        };
        Ok(result)
    }

    async fn run_with_retry(&self, action: &str, args: &[&str]) -> IacResult<TerraformResult> {
        let spec = self.command(args);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = self.execute(&spec).await?;
            if result.success() {
                return Ok(TerraformResult::from_execution(&result, attempt));
            }

            let output = result.combined_output();
            match self.retry.matching(&output) {
                Some(reason) if attempt <= self.retry.max_retries => {
                    warn!(
                        "terraform {} failed with a retryable error ({}); retry {}/{} in {:?}",
                        action, reason, attempt, self.retry.max_retries, self.retry.interval
                    );
                    tokio::time::sleep(self.retry.interval).await;
                }
                _ => return Ok(TerraformResult::from_execution(&result, attempt)),
            }
        }
    }
}
