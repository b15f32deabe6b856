//! Command and run configuration types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A single external command invocation.
///
/// Environment values marked secret are passed to the child process but
/// never rendered by [`CommandSpec::display`], the `Debug` impl, or when
/// serialized.
#[derive(Clone, Deserialize)]
pub struct CommandSpec {
    /// Program to execute (resolved through `PATH`)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory of the child process
    pub workdir: Option<PathBuf>,
    /// Environment variables added to the inherited environment
    pub env: BTreeMap<String, String>,
    /// Names of environment variables whose values must not be logged
    #[serde(default)]
    pub secret_env: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
            secret_env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add an environment variable whose value is redacted in logs.
    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.secret_env.push(key.clone());
        self.env.insert(key, value.into());
        self
    }

    /// First argument, which for subcommand-style tools names the operation.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Render the command line for logging.
    pub fn display(&self) -> String {
        let mut cmd = self.program.clone();
        for arg in &self.args {
            if arg.contains(' ') || arg.is_empty() {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push(' ');
                cmd.push_str(arg);
            }
        }
        cmd
    }

    /// Environment with secret values replaced by a placeholder.
    pub fn redacted_env(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| {
                if self.secret_env.contains(k) {
                    (k.clone(), "<redacted>".to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("workdir", &self.workdir)
            .field("env", &self.redacted_env())
            .finish()
    }
}

impl Serialize for CommandSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommandSpec", 5)?;
        state.serialize_field("program", &self.program)?;
        state.serialize_field("args", &self.args)?;
        state.serialize_field("workdir", &self.workdir)?;
        state.serialize_field("env", &self.redacted_env())?;
        state.serialize_field("secret_env", &self.secret_env)?;
        state.end()
    }
}

/// Run configuration with timeouts and output handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    /// Whether to stream output lines while the process runs
    pub stream_logs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 1800, // 30 minutes
            stream_logs: false,
        }
    }
}

impl RunConfig {
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Enable or disable log streaming.
    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("terraform")
            .args(["apply", "-auto-approve"])
            .workdir("/tmp/ws")
            .env("TF_IN_AUTOMATION", "1");

        assert_eq!(spec.subcommand(), Some("apply"));
        assert_eq!(spec.display(), "terraform apply -auto-approve");
        assert_eq!(spec.workdir, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(spec.env.get("TF_IN_AUTOMATION"), Some(&"1".to_string()));
    }

    #[test]
    fn test_secret_env_is_redacted() {
        let spec = CommandSpec::new("terraform")
            .arg("plan")
            .secret_env("PROXMOX_API_TOKEN_SECRET", "hunter2");

        assert_eq!(
            spec.env.get("PROXMOX_API_TOKEN_SECRET"),
            Some(&"hunter2".to_string())
        );
        let debug = format!("{:?}", spec);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_serialize_redacts_secret_env() {
        let spec = CommandSpec::new("terraform")
            .arg("apply")
            .env("TF_IN_AUTOMATION", "1")
            .secret_env("PROXMOX_API_TOKEN_SECRET", "hunter2");

        let value = serde_json::to_value(&spec).unwrap();

        assert_eq!(value["env"]["PROXMOX_API_TOKEN_SECRET"], "<redacted>");
        assert_eq!(value["env"]["TF_IN_AUTOMATION"], "1");
        assert_eq!(value["secret_env"][0], "PROXMOX_API_TOKEN_SECRET");
        assert!(!value.to_string().contains("hunter2"));
    }

    #[test]
    fn test_display_quotes_spaces() {
        let spec = CommandSpec::new("echo").args(["a b", ""]);
        assert_eq!(spec.display(), "echo 'a b' ''");
    }
}
