//! Containerized execution of tool commands.
//!
//! Rewrites a host [`CommandSpec`] into a `docker run` / `podman run`
//! invocation. The command's working directory is mounted into the
//! container, and environment variables are forwarded by name so their
//! values never appear on the runtime's command line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::ProcessRunner;

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    /// Detect an available runtime, trying the preferred one first.
    pub async fn detect(
        runner: &dyn ProcessRunner,
        preferred: Option<ContainerRuntime>,
    ) -> RunnerResult<ContainerRuntime> {
        if let Some(preferred) = preferred {
            if runner.is_available(preferred.command()).await? {
                return Ok(preferred);
            }
            warn!(
                "Preferred runtime {} not available, trying alternatives",
                preferred
            );
        }

        for candidate in [Self::Docker, Self::Podman] {
            if runner.is_available(candidate.command()).await? {
                return Ok(candidate);
            }
        }

        Err(RunnerError::RuntimeNotAvailable(
            "Neither Docker nor Podman is available".to_string(),
        ))
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Container mount configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Host path to mount
    pub source: PathBuf,
    /// Container path to mount to
    pub target: String,
}

impl MountConfig {
    pub fn new(source: PathBuf, target: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
        }
    }

    fn spec(&self) -> String {
        format!("{}:{}", self.source.to_string_lossy(), self.target)
    }
}

/// Image and runtime used to run a tool inside a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub runtime: ContainerRuntime,
    pub image: String,
    pub tag: String,
    /// Path the command's working directory is mounted at
    pub workdir: String,
    /// Network mode
    pub network_mode: Option<String>,
}

impl ContainerConfig {
    pub fn new(runtime: ContainerRuntime, image: impl Into<String>) -> Self {
        Self {
            runtime,
            image: image.into(),
            tag: "latest".to_string(),
            workdir: "/workspace".to_string(),
            network_mode: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network_mode = Some(network.into());
        self
    }

    /// Get the full image name with tag.
    pub fn full_image(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Wrap a host command so it runs inside the container.
    ///
    /// The image entrypoint is expected to be the tool itself, so only the
    /// arguments of `inner` are forwarded.
    pub fn wrap(&self, inner: &CommandSpec) -> RunnerResult<CommandSpec> {
        let host_dir = inner.workdir.clone().ok_or_else(|| {
            RunnerError::InvalidMount(format!(
                "'{}' has no working directory to mount",
                inner.display()
            ))
        })?;

        let mut outer = CommandSpec::new(self.runtime.command())
            .args(["run", "--rm", "-i"])
            .args(["-w", self.workdir.as_str()])
            .args([
                "-v".to_string(),
                MountConfig::new(host_dir.clone(), self.workdir.clone()).spec(),
            ]);

        for key in inner.env.keys() {
            outer = outer.args(["-e", key.as_str()]);
        }
        if let Some(network) = &self.network_mode {
            outer = outer.args(["--network", network.as_str()]);
        }

        outer = outer.arg(self.full_image()).args(inner.args.iter().cloned());
        outer.workdir = Some(host_dir);
        outer.env = inner.env.clone();
        outer.secret_env = inner.secret_env.clone();
        Ok(outer)
    }
}
