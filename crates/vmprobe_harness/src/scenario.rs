//! Scenario files.
//!
//! A scenario is the YAML description of one invocation: which bundle to
//! apply, with which variables, and what the outputs must be.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vmprobe_iac::{RetryPolicy, TerraformBinary};
use vmprobe_runner::{ContainerConfig, ContainerRuntime, ProcessRunner};

use crate::error::{HarnessError, HarnessResult};
use crate::expect::Expectations;
use crate::params::VmParameters;

fn default_settle_seconds() -> u64 {
    10
}

/// Running terraform inside a container instead of from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSettings {
    #[serde(default = "ContainerSettings::default_image")]
    pub image: String,
    #[serde(default = "ContainerSettings::default_tag")]
    pub tag: String,
    /// Auto-detected when unset
    #[serde(default)]
    pub runtime: Option<ContainerRuntime>,
}

impl ContainerSettings {
    fn default_image() -> String {
        "hashicorp/terraform".to_string()
    }

    fn default_tag() -> String {
        "1.6".to_string()
    }
}

/// How terraform itself is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformSettings {
    /// Host binary name or path
    pub binary: String,
    pub container: Option<ContainerSettings>,
    /// Per-command timeout in seconds (0 = none)
    pub command_timeout_seconds: u64,
    pub stream_logs: bool,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            container: None,
            command_timeout_seconds: 1800,
            stream_logs: false,
        }
    }
}

/// One provisioning test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Configuration bundle; relative paths resolve against the scenario file
    pub terraform_dir: PathBuf,
    #[serde(default)]
    pub vars: VmParameters,
    #[serde(default)]
    pub expect: Expectations,
    /// Wait between apply and the status-dependent output reads
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
    /// Wall-clock budget for provisioning plus validation
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub require_clean_teardown: bool,
    /// Leave the workspace copy on disk after the run
    #[serde(default)]
    pub keep_workspace: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub terraform: TerraformSettings,
}

impl Scenario {
    /// A scenario with default variables and expectations.
    pub fn new(name: impl Into<String>, terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            terraform_dir: terraform_dir.into(),
            vars: VmParameters::default(),
            expect: Expectations::default(),
            settle_seconds: default_settle_seconds(),
            timeout_seconds: None,
            require_clean_teardown: false,
            keep_workspace: false,
            retry: RetryPolicy::default(),
            terraform: TerraformSettings::default(),
        }
    }

    /// Load a scenario file.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = fs::read_to_string(path)?;
        let mut scenario = Self::from_yaml(&content)?;

        if scenario.name.is_empty() {
            scenario.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "scenario".to_string());
        }
        if scenario.terraform_dir.is_relative() {
            if let Some(parent) = path.parent() {
                scenario.terraform_dir = parent.join(&scenario.terraform_dir);
            }
        }
        Ok(scenario)
    }

    pub fn from_yaml(content: &str) -> HarnessResult<Self> {
        let scenario: Self = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.terraform_dir.as_os_str().is_empty() {
            return Err(HarnessError::Scenario("terraform_dir is required".to_string()));
        }
        if self.timeout_seconds == Some(0) {
            return Err(HarnessError::Scenario(
                "timeout_seconds must be positive when set".to_string(),
            ));
        }
        self.vars.validate()
    }

    /// Resolve how terraform is launched, detecting a container runtime if needed.
    pub async fn terraform_binary(
        &self,
        runner: &dyn ProcessRunner,
    ) -> HarnessResult<TerraformBinary> {
        let settings = &self.terraform;
        let Some(container) = &settings.container else {
            return Ok(TerraformBinary::Host(settings.binary.clone()));
        };

        let runtime = ContainerRuntime::detect(runner, container.runtime)
            .await
            .map_err(|e| HarnessError::Iac(e.into()))?;
        Ok(TerraformBinary::Container(
            ContainerConfig::new(runtime, &container.image)
                .tag(&container.tag)
                .network("host"),
        ))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_seconds)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    pub fn with_expectations(mut self, expect: Expectations) -> Self {
        self.expect = expect;
        self
    }

    pub fn with_vars(mut self, vars: VmParameters) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_settle(mut self, seconds: u64) -> Self {
        self.settle_seconds = seconds;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn require_clean_teardown(mut self) -> Self {
        self.require_clean_teardown = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::OsType;

    const MINIMAL: &str = "terraform_dir: ../proxmox_env/micro_env\n";

    #[test]
    fn test_minimal_scenario_uses_defaults() {
        let scenario = Scenario::from_yaml(MINIMAL).unwrap();

        assert_eq!(scenario.vars, VmParameters::default());
        assert_eq!(scenario.expect, Expectations::default());
        assert_eq!(scenario.settle(), Duration::from_secs(10));
        assert_eq!(scenario.timeout(), None);
        assert_eq!(scenario.retry.max_retries, 3);
        assert_eq!(scenario.terraform.binary, "terraform");
    }

    #[test]
    fn test_full_scenario() {
        let yaml = r#"
name: micro-vm
terraform_dir: /opt/proxmox_env/micro_env
vars:
  name_vm: test
  description: Test VM
  node_name: pve
  vm_id: "1000"
  cores: 2
  memory: 4096
  os_type: l26
  template_vm: false
  started: true
  network_device:
    - { bridge: vmbr1, model: e1000, enabled: true }
  disk: []
  tags: [ci]
expect:
  name: test
  status: running
  outputs:
    node: pve
settle_seconds: 0
timeout_seconds: 900
require_clean_teardown: true
retry:
  max_retries: 1
  time_between_retries_seconds: 2
terraform:
  container:
    tag: "1.7"
    runtime: podman
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();

        assert_eq!(scenario.name, "micro-vm");
        assert_eq!(scenario.vars.cores, 2);
        assert_eq!(scenario.vars.os_type, OsType::L26);
        assert_eq!(scenario.vars.network_device[0].model, "e1000");
        assert!(scenario.vars.extra.contains_key("tags"));
        assert_eq!(scenario.expect.status.as_deref(), Some("running"));
        assert!(scenario.expect.vm_id_non_empty);
        assert_eq!(scenario.timeout(), Some(Duration::from_secs(900)));
        assert!(scenario.require_clean_teardown);
        assert_eq!(scenario.retry.max_retries, 1);
        assert!(!scenario.retry.patterns.is_empty());

        let container = scenario.terraform.container.unwrap();
        assert_eq!(container.image, "hashicorp/terraform");
        assert_eq!(container.tag, "1.7");
        assert_eq!(container.runtime, Some(ContainerRuntime::Podman));
    }

    #[test]
    fn test_load_resolves_relative_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("micro.yaml");
        fs::write(&path, MINIMAL).unwrap();

        let scenario = Scenario::load(&path).unwrap();

        assert_eq!(scenario.name, "micro");
        assert_eq!(
            scenario.terraform_dir,
            dir.path().join("../proxmox_env/micro_env")
        );
    }

    #[test]
    fn test_shipped_micro_vm_scenario() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../scenarios/proxmox_micro_vm.yaml");
        let scenario = Scenario::load(&path).unwrap();

        assert_eq!(scenario.name, "proxmox-micro-vm");
        assert_eq!(scenario.vars, VmParameters::default());
        assert_eq!(scenario.expect, Expectations::default());
        assert!(scenario.terraform_dir.ends_with("proxmox_env/micro_env"));
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(Scenario::from_yaml("vars: {}\n").is_err());
        assert!(Scenario::from_yaml("terraform_dir: x\ntimeout_seconds: 0\n").is_err());
        assert!(Scenario::from_yaml("terraform_dir: x\nvars:\n  cores: 0\n").is_err());
    }
}
