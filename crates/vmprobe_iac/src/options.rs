//! Terraform invocation options.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use vmprobe_runner::ContainerConfig;

use crate::retry::RetryPolicy;

/// How the terraform binary is launched.
#[derive(Debug, Clone)]
pub enum TerraformBinary {
    /// Executable on the host (name or path)
    Host(String),
    /// Image whose entrypoint is terraform
    Container(ContainerConfig),
}

impl Default for TerraformBinary {
    fn default() -> Self {
        Self::Host("terraform".to_string())
    }
}

/// Everything needed to run Terraform against one working directory.
#[derive(Clone)]
pub struct TerraformOptions {
    /// Directory holding the configuration (and, after init, the state)
    pub terraform_dir: PathBuf,
    /// Input variables
    pub vars: Map<String, Value>,
    /// Var file passed to apply/destroy, relative to `terraform_dir`
    pub var_file: Option<String>,
    /// Plain environment variables for the terraform process
    pub env: BTreeMap<String, String>,
    /// Environment variables whose values are redacted in logs
    pub secret_env: BTreeMap<String, String>,
    pub retry: RetryPolicy,
    pub binary: TerraformBinary,
    /// Per-command timeout in seconds (0 = none)
    pub command_timeout_seconds: u64,
    /// Echo terraform output while it runs
    pub stream_logs: bool,
}

impl TerraformOptions {
    pub fn new(terraform_dir: impl AsRef<Path>) -> Self {
        Self {
            terraform_dir: terraform_dir.as_ref().to_path_buf(),
            vars: Map::new(),
            var_file: None,
            env: BTreeMap::new(),
            secret_env: BTreeMap::new(),
            retry: RetryPolicy::default(),
            binary: TerraformBinary::default(),
            command_timeout_seconds: 1800,
            stream_logs: false,
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn vars(mut self, vars: Map<String, Value>) -> Self {
        self.vars.extend(vars);
        self
    }

    pub fn var_file(mut self, file: impl Into<String>) -> Self {
        self.var_file = Some(file.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secret_env.insert(key.into(), value.into());
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn binary(mut self, binary: TerraformBinary) -> Self {
        self.binary = binary;
        self
    }

    pub fn command_timeout(mut self, seconds: u64) -> Self {
        self.command_timeout_seconds = seconds;
        self
    }

    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }
}

impl fmt::Debug for TerraformOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret_env: BTreeMap<&str, &str> = self
            .secret_env
            .keys()
            .map(|k| (k.as_str(), "<redacted>"))
            .collect();
        f.debug_struct("TerraformOptions")
            .field("terraform_dir", &self.terraform_dir)
            .field("vars", &self.vars)
            .field("var_file", &self.var_file)
            .field("env", &self.env)
            .field("secret_env", &secret_env)
            .field("retry", &self.retry)
            .field("binary", &self.binary)
            .field("command_timeout_seconds", &self.command_timeout_seconds)
            .field("stream_logs", &self.stream_logs)
            .finish()
    }
}
